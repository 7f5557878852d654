use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

use refledger::config::LedgerConfig;
use refledger::engine::verification::VerificationOutcome;
use refledger::engine::Engine;
use refledger::notify::sync::NoopSync;
use refledger::notify::{Dispatcher, Notifier};
use refledger::service::LedgerService;
use refledger::storage;

use crate::common::engine;

/// Forwards every delivered notice to a channel.
struct ChannelNotifier(mpsc::UnboundedSender<(String, String)>);

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, user_id: &str, message: &str) -> anyhow::Result<()> {
        self.0.send((user_id.to_string(), message.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

fn service_over(engine: Engine) -> (Arc<LedgerService>, mpsc::UnboundedReceiver<(String, String)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(Arc::new(ChannelNotifier(tx)), Duration::from_secs(1));
    let service = LedgerService::new(
        Arc::new(engine),
        dispatcher,
        Arc::new(NoopSync),
        Duration::from_secs(1),
    );
    (Arc::new(service), rx)
}

async fn next_notice(rx: &mut mpsc::UnboundedReceiver<(String, String)>) -> (String, String) {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("notice within timeout")
        .expect("channel open")
}

#[tokio::test]
async fn test_verification_notice_reaches_user() {
    let (engine, _) = engine();
    let (service, mut rx) = service_over(engine);

    service.create_or_get_user("v");
    let (_, welcome) = next_notice(&mut rx).await;
    assert!(welcome.contains("Welcome"));

    let outcome = service.confirm_verification("v").unwrap();
    assert_eq!(outcome, VerificationOutcome::Verified { credited: dec!(500) });
    let (user, message) = next_notice(&mut rx).await;
    assert_eq!(user, "v");
    assert!(message.contains("₦500"));

    assert_eq!(
        service.confirm_verification("v").unwrap(),
        VerificationOutcome::AlreadyVerified
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_snapshot_survives_restart() {
    let path = std::env::temp_dir().join(format!("refledger-it-{}.json", uuid::Uuid::new_v4()));
    let path = path.to_string_lossy().to_string();

    let (engine, clock) = engine();
    let (service, _rx) = service_over(engine);
    service.start_session("a");
    service.apply_referral("a", "b").unwrap();
    service.confirm_verification("a").unwrap();
    service.save_snapshot(&path).unwrap();

    let snapshot = storage::load_snapshot(&path).unwrap().expect("snapshot on disk");
    let restored = Engine::new(
        LedgerConfig::default(),
        clock,
        Arc::new(refledger::engine::profit::FractionSampler(0.0)),
    )
    .restore(snapshot);

    let before = service.user("a").unwrap();
    let after = restored.user("a").unwrap();
    assert_eq!(after, before);
    assert_eq!(after.referrals_count, 1);
    assert_eq!(restored.user("b").unwrap().referred_by.as_deref(), Some("a"));
    assert_eq!(
        restored.transactions_for("a").len(),
        service.transactions_for("a").unwrap().len()
    );

    storage::delete_snapshot(&path).unwrap();
}
