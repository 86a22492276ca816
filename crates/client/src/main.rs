//! Labnotify - follow one user's notifications from the terminal.
//!
//! Reads `LABNOTIFY_*` configuration plus `LABNOTIFY_USER_ID` and
//! `LABNOTIFY_TOKEN`, then logs every delivery until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use labnotify_client::shared::UserId;
use labnotify_client::{
    attach, log_info, Credential, EventDispatcher, NotificationClient, NotificationStore, NotifyConfig,
};
use parking_lot::Mutex;

fn required_var(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    labnotify_client::logging::init("labnotify=debug,info");

    let config = NotifyConfig::from_env().context("invalid configuration")?;
    let user_id: UserId = required_var("LABNOTIFY_USER_ID")?
        .parse()
        .context("LABNOTIFY_USER_ID must be an integer")?;
    let credential = Credential::bearer(required_var("LABNOTIFY_TOKEN")?);

    let store = Arc::new(Mutex::new(NotificationStore::new()));
    let dispatcher = EventDispatcher::new();
    let _merge = attach(store.clone(), &dispatcher);

    let feed = store.clone();
    let _feed = dispatcher.subscribe_notifications(move |event| {
        log_info!(
            "{:?} notification {} (unread: {})",
            event.kind,
            event.payload.id,
            feed.lock().unread_count()
        );
    });

    let mut client = NotificationClient::new(config);
    let mut state = client.sign_in(user_id, credential, dispatcher).await.watch();

    let mut badge = state.borrow().badge();
    log_info!("watching notifications for user {} ({:?})", user_id, badge);
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl-C")?;
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = state.borrow_and_update().badge();
                if next != badge {
                    log_info!("connection: {:?}", next);
                    badge = next;
                }
            }
        }
    }

    client.sign_out().await;
    let store = store.lock();
    log_info!(
        "signed out with {} notification(s), {} unread",
        store.len(),
        store.unread_count()
    );
    Ok(())
}
