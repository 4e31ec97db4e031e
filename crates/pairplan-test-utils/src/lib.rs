pub mod assertions;
pub mod server;
pub mod stores;

pub use assertions::{assert_api_error, assert_api_ok};
pub use server::{
    TEST_ACCESS_SECRET, TestApp, create_test_app, create_test_config, issue_token, send_request,
    send_request_with_headers,
};
pub use stores::{TestStores, create_test_stores};

#[cfg(test)]
mod tests {
    use super::*;
    use pairplan_core::{LinkageStore, UsageStore};

    #[tokio::test]
    async fn test_stores_are_usable() {
        let stores = create_test_stores().await;

        assert!(stores.linkage_store.get_profile("nobody").await.unwrap().is_none());
        assert!(stores.usage_store.get_active_plan("nobody").await.unwrap().is_none());
    }
}
