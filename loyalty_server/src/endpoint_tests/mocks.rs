use std::time::Duration;

use async_trait::async_trait;
use loyalty_engine::{
    db_types::{OrderNumber, Points},
    AccrualApi,
    AccrualError,
    AccrualResult,
    AccrualStatus,
};
use mockall::mock;

mock! {
    pub Authority {}
    #[async_trait]
    impl AccrualApi for Authority {
        async fn fetch_accrual(&self, number: &OrderNumber, deadline: Duration) -> Result<AccrualResult, AccrualError>;
    }
}

/// An authority that can never be reached. Orders stay `NEW`.
pub fn offline_authority() -> MockAuthority {
    let mut authority = MockAuthority::new();
    authority.expect_fetch_accrual().returning(|_, _| Err(AccrualError::Transport("connection refused".into())));
    authority
}

/// An authority that awards `points` to every order.
pub fn generous_authority(points: i64) -> MockAuthority {
    let mut authority = MockAuthority::new();
    authority.expect_fetch_accrual().returning(move |number, _| {
        Ok(AccrualResult {
            order_number: number.clone(),
            status: AccrualStatus::Processed,
            accrual: Points::from_whole(points),
        })
    });
    authority
}
