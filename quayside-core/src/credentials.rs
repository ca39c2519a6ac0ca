use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use quayside_domain::{EventCode, GateCredential, Requester, TerminalStore};

use crate::audit::record;
use crate::authz::require_owner_or_admin;
use crate::error::CoreError;

const TOKEN_PREFIX: &str = "gate_";
const TOKEN_RANDOM_LEN: usize = 40;

/// Issues the opaque gate token for a booking. Idempotent: the first call
/// mints and persists the token, every later call for the same booking
/// returns it unchanged.
pub struct CredentialIssuer {
    store: Arc<dyn TerminalStore>,
}

impl CredentialIssuer {
    pub fn new(store: Arc<dyn TerminalStore>) -> Self {
        Self { store }
    }

    pub async fn get_or_create(
        &self,
        booking_id: Uuid,
        requester: &Requester,
    ) -> Result<GateCredential, CoreError> {
        let booking = self
            .store
            .booking(booking_id)
            .await?
            .ok_or(CoreError::NotFound("booking"))?;
        require_owner_or_admin(&booking, requester)?;

        if let Some(existing) = self.store.credential_for_booking(booking_id).await? {
            return Ok(existing);
        }

        let minted = GateCredential::new(booking_id, mint_token());
        let credential = self.store.insert_credential(&minted).await?;

        // A concurrent first request may have won the insert; the store then
        // hands back its credential and only the winner is audited.
        if credential.id == minted.id {
            info!(booking_id = %booking_id, "gate credential issued");
            record(
                self.store.as_ref(),
                EventCode::QrGenerated,
                format!("QR Code generated for booking {booking_id}"),
            )
            .await;
        }

        Ok(credential)
    }
}

/// Fixed prefix plus 40 alphanumerics from the thread-local CSPRNG.
fn mint_token() -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{TOKEN_PREFIX}{random}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_prefixed_and_long_enough() {
        let token = mint_token();
        assert!(token.starts_with(TOKEN_PREFIX));
        assert_eq!(token.len(), TOKEN_PREFIX.len() + TOKEN_RANDOM_LEN);
    }

    #[test]
    fn tokens_do_not_repeat() {
        assert_ne!(mint_token(), mint_token());
    }

    use chrono::NaiveDate;
    use quayside_domain::repository::{BookingStore, TimeslotStore};
    use quayside_domain::{Booking, CapacityConfig, Role, SlotKey, TerminalStore};
    use quayside_store::MemoryStore;

    async fn issuer_with_booking() -> (CredentialIssuer, Booking) {
        let store = Arc::new(MemoryStore::with_config(CapacityConfig::default()));
        let key = SlotKey::new(NaiveDate::from_ymd_opt(2026, 2, 8).unwrap(), 9);
        let slot = store
            .get_or_create_slot(key, CapacityConfig::default())
            .await
            .unwrap();
        let booking = Booking::new(Uuid::new_v4(), "TRK-1".into(), slot.id);
        store.insert_booking(&booking).await.unwrap();
        let dyn_store: Arc<dyn TerminalStore> = store;
        (CredentialIssuer::new(dyn_store), booking)
    }

    #[tokio::test]
    async fn reissue_returns_the_same_token() {
        let (issuer, booking) = issuer_with_booking().await;
        let owner = Requester::new(booking.user_id, Role::Carrier);

        let first = issuer.get_or_create(booking.id, &owner).await.unwrap();
        let second = issuer.get_or_create(booking.id, &owner).await.unwrap();
        assert_eq!(first.token, second.token);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn concurrent_issuance_yields_one_credential() {
        let (issuer, booking) = issuer_with_booking().await;
        let owner = Requester::new(booking.user_id, Role::Carrier);

        let (a, b) = tokio::join!(
            issuer.get_or_create(booking.id, &owner),
            issuer.get_or_create(booking.id, &owner),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.id, b.id);
        assert_eq!(a.token, b.token);
    }

    #[tokio::test]
    async fn strangers_cannot_fetch_a_credential() {
        let (issuer, booking) = issuer_with_booking().await;
        let stranger = Requester::new(Uuid::new_v4(), Role::Carrier);

        let err = issuer
            .get_or_create(booking.id, &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));

        // Admins always can.
        let admin = Requester::new(Uuid::new_v4(), Role::Admin);
        let credential = issuer.get_or_create(booking.id, &admin).await.unwrap();
        assert!(credential.token.starts_with(TOKEN_PREFIX));
    }
}
