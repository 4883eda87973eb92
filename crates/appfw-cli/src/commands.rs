//! Subcommand implementations.
//!
//! Each command issues its requests, then runs the context's event loop
//! until its completions are in or shutdown is requested.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use appfw_core::{ContextHandle, ListResult, TargetSpec, UserData};

/// What `send` should do, already validated by argument parsing.
#[derive(Debug)]
pub struct SendPlan {
    pub events: Vec<String>,
    pub payload: String,
    pub target: TargetSpec,
    pub count: u32,
    pub interval: Duration,
}

impl SendPlan {
    fn total(&self) -> usize {
        self.events.len() * self.count as usize
    }
}

/// Run the event loop until it stops by itself or `shutdown` is notified.
///
/// A notification sent before this is called still counts.
async fn drive(handle: &ContextHandle, shutdown: &Notify) -> Result<()> {
    tokio::select! {
        result = handle.run_loop() => result?,
        _ = shutdown.notified() => info!("Shutdown signal received, stopping"),
    }
    Ok(())
}

/// Print subscribed events and subscription outcomes until the loop stops.
pub async fn listen(handle: &ContextHandle, events: Vec<String>, shutdown: &Notify) -> Result<()> {
    {
        let mut ctx = handle.lock();
        ctx.set_event_handler(
            |event, _| println!("{} {}", event.name, event.payload),
            None,
        );
        ctx.set_status_handler(
            |update, _| {
                if update.is_success() {
                    info!("Subscription update {} accepted", update.id);
                } else {
                    warn!(
                        "Subscription update {} failed with status {}: {}",
                        update.id, update.status, update.message
                    );
                }
            },
            None,
        );
        ctx.bridge_signals()?;
        ctx.set_event_subscriptions(events)?;
    }

    info!("Listening; press Ctrl-C to stop");
    drive(handle, shutdown).await
}

/// Send `plan.count` bundles and wait for every completion.
///
/// The first bundle is issued here so that bad input fails before the loop
/// starts; the rest follow from a worker thread, `plan.interval` apart.
pub async fn send(handle: &ContextHandle, plan: SendPlan, shutdown: &Notify) -> Result<()> {
    let total = plan.total();
    if total == 0 {
        return Ok(());
    }

    let completed = Arc::new(AtomicUsize::new(0));
    send_bundle(handle, &plan, 0, &completed, total)?;

    let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
    let worker_handle = handle.clone();
    let worker_completed = completed.clone();
    let worker = std::thread::spawn(move || {
        for bundle in 1..plan.count {
            // Disconnect means the loop is gone
            match cancel_rx.recv_timeout(plan.interval) {
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                _ => return Ok(()),
            }
            if let Err(e) = send_bundle(&worker_handle, &plan, bundle, &worker_completed, total) {
                error!("Sending stopped: {}", e);
                worker_handle.stop_loop();
                return Err(e);
            }
        }
        Ok(())
    });

    let loop_result = drive(handle, shutdown).await;
    drop(cancel_tx);

    let worker_result = worker
        .join()
        .map_err(|_| anyhow!("Send worker panicked"))?;
    loop_result?;
    worker_result?;

    let done = completed.load(Ordering::SeqCst);
    if done < total {
        warn!("Stopped after {} of {} completions", done, total);
    }
    Ok(())
}

/// Issue one send per event under a single lock.
fn send_bundle(
    handle: &ContextHandle,
    plan: &SendPlan,
    bundle: u32,
    completed: &Arc<AtomicUsize>,
    total: usize,
) -> appfw_core::Result<()> {
    let mut ctx = handle.lock();
    for event in &plan.events {
        let name = event.clone();
        let completed = completed.clone();
        let stopper = handle.clone();
        let id = ctx.send_event(
            event,
            &plan.payload,
            &plan.target,
            move |result, _| {
                match result.check() {
                    Ok(event_id) => println!("{}: delivered as event {}", name, event_id),
                    Err(failure) => println!("{}: {}", name, failure),
                }
                if completed.fetch_add(1, Ordering::SeqCst) + 1 == total {
                    stopper.stop_loop();
                }
            },
            None,
        )?;
        debug!("Bundle {} queued {} as {}", bundle, event, id);
    }
    Ok(())
}

/// Print the application list once it arrives.
pub async fn list(handle: &ContextHandle, running: bool, shutdown: &Notify) -> Result<()> {
    let stopper = handle.clone();
    let print = move |result: ListResult, _: Option<UserData>| {
        match result.check() {
            Ok(apps) if apps.is_empty() => println!("No applications"),
            Ok(apps) => {
                for app in apps {
                    println!(
                        "{}\tuid={}\t{}\t{}",
                        app.app_id(),
                        app.user_id(),
                        app.desktop().display(),
                        app.description()
                    );
                }
            }
            Err(failure) => println!("Listing failed: {}", failure),
        }
        stopper.stop_loop();
    };

    {
        let mut ctx = handle.lock();
        if running {
            ctx.list_running_applications(print, None)?;
        } else {
            ctx.list_all_applications(print, None)?;
        }
    }

    drive(handle, shutdown).await
}
