//! Development server with live reload support.
//!
//! One thread accepts connections and hands them to a small rayon pool.
//! The file watcher, reload monitor and WebSocket reader each run on their
//! own named thread until the shared `Running` flag is cleared.

mod dispatch;
mod inject;
mod lifecycle;
mod path;
mod request;
mod response;


pub use request::RequestHead;

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::core::Running;
use crate::embed::serve::HotreloadVars;
use crate::reload::{ChangeSignal, ReloadMonitor};
use crate::watch::FileWatcher;
use crate::ws::ClientRegistry;
use crate::{debug, log};
use dispatch::ServeContext;

/// Sleep between accept attempts when no connection is pending.
const ACCEPT_IDLE: Duration = Duration::from_millis(50);
/// Interval of the WebSocket reader loop.
const READER_INTERVAL: Duration = Duration::from_millis(100);

/// Bound server ready to accept requests
pub struct BoundServer {
    listener: TcpListener,
    addr: SocketAddr,
    ctx: Arc<ServeContext>,
    signal: Arc<ChangeSignal>,
    watcher: FileWatcher,
}

/// Validate the HTML directory, start watching it and bind the listener.
///
/// Nothing is spawned yet; `run` starts the background threads.
pub fn bind_server(config: Arc<Config>, running: Running) -> Result<BoundServer> {
    let root = config
        .serve
        .root
        .canonicalize()
        .with_context(|| {
            format!("HTML directory `{}` is not accessible", config.serve.root.display())
        })?;

    let signal = Arc::new(ChangeSignal::new());
    let watcher = FileWatcher::new(&root, &config.watch, Arc::clone(&signal))?;

    let listener = lifecycle::bind_with_retry(
        config.serve.addr(),
        config.serve.bind_retries,
        config.serve.bind_retry_delay(),
        &running,
    )?;
    listener.set_nonblocking(true)?;
    let addr = listener.local_addr()?;

    let ctx = Arc::new(ServeContext {
        registry: Arc::new(ClientRegistry::new(config.ws.limits())),
        script: inject::script_tag(&HotreloadVars::default()),
        root,
        running,
        config,
    });

    log!("serve"; "http://{}", addr);
    debug!("serve"; "live reload on ws://{}/ws", addr);

    Ok(BoundServer {
        listener,
        addr,
        ctx,
        signal,
        watcher,
    })
}

impl BoundServer {
    /// Get the bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[cfg(test)]
    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.ctx.registry)
    }

    /// Run until the `Running` flag is cleared (blocking).
    pub fn run(self) -> Result<()> {
        let Self {
            listener,
            ctx,
            signal,
            watcher,
            ..
        } = self;
        let running = ctx.running.clone();

        let handles = match spawn_background(&ctx, signal, watcher) {
            Ok(handles) => handles,
            Err(e) => {
                running.stop();
                return Err(e);
            }
        };

        let result = accept_loop(&listener, &ctx);
        running.stop();
        drop(listener);

        let timeout = ctx.config.reload.shutdown_timeout();
        lifecycle::wait_for_shutdown(handles, timeout);
        ctx.registry.close_all();
        log!("serve"; "stopped");
        result
    }
}

fn spawn_background(
    ctx: &Arc<ServeContext>,
    signal: Arc<ChangeSignal>,
    mut watcher: FileWatcher,
) -> Result<Vec<std::thread::JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(3);
    let running = ctx.running.clone();

    let watch_running = running.clone();
    handles.push(lifecycle::spawn_named("watcher", move || {
        watcher.run(&watch_running);
    })?);

    let mut monitor = ReloadMonitor::new(signal, Arc::clone(&ctx.registry), &ctx.config.reload);
    let monitor_running = running.clone();
    handles.push(lifecycle::spawn_named("reload-monitor", move || {
        monitor.run(&monitor_running);
    })?);

    let registry = Arc::clone(&ctx.registry);
    handles.push(lifecycle::spawn_named("ws-reader", move || {
        while running.is_running() {
            registry.service();
            running.sleep(READER_INTERVAL);
        }
    })?);

    Ok(handles)
}

fn accept_loop(listener: &TcpListener, ctx: &Arc<ServeContext>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(ctx.config.serve.workers)
        .thread_name(|i| format!("http-{i}"))
        .build()
        .context("failed to create connection pool")?;

    while ctx.running.is_running() {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!("serve"; "connection from {}", peer);
                if let Err(e) = stream.set_nonblocking(false) {
                    debug!("serve"; "failed to configure {}: {}", peer, e);
                    continue;
                }
                let ctx = Arc::clone(ctx);
                pool.spawn(move || dispatch::handle_connection(stream, &ctx));
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_IDLE);
            }
            Err(e) => {
                log!("serve"; "accept error: {}", e);
                std::thread::sleep(ACCEPT_IDLE);
            }
        }
    }
    Ok(())
}

/// Bind and serve until shutdown.
pub fn run(config: Arc<Config>, running: Running) -> Result<()> {
    bind_server(config, running)?.run()
}
