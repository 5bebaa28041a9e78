//! Reload monitor.
//!
//! Waits on the change signal and broadcasts `reload` to every client,
//! at most once per cooldown. A change arriving during the cooldown stays
//! pending and is sent once the cooldown ends. Independently, `ping` is
//! broadcast on a longer interval so dead peers get pruned.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::{ChangeSignal, ReloadMessage};
use crate::config::ReloadConfig;
use crate::core::Running;
use crate::logger::status_success;
use crate::ws::ClientRegistry;
use crate::{debug, log};

/// What the monitor should do at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    /// Nothing pending.
    Idle,
    /// A change is pending but the cooldown has this much left.
    Deferred(Duration),
    /// Clear the signal and broadcast `reload`.
    Reload,
    /// Broadcast a keep-alive `ping`.
    Ping,
}

pub struct ReloadMonitor {
    signal: Arc<ChangeSignal>,
    registry: Arc<ClientRegistry>,
    config: ReloadConfig,
    last_reload: Option<Instant>,
    last_ping: Instant,
}

impl ReloadMonitor {
    pub fn new(
        signal: Arc<ChangeSignal>,
        registry: Arc<ClientRegistry>,
        config: &ReloadConfig,
    ) -> Self {
        Self {
            signal,
            registry,
            config: config.clone(),
            last_reload: None,
            last_ping: Instant::now(),
        }
    }

    /// Pure decision for `now` given whether a change is pending.
    pub fn decide(&self, changed: bool, now: Instant) -> MonitorAction {
        let cooldown_left = self
            .last_reload
            .map(|t| self.config.cooldown().saturating_sub(now.saturating_duration_since(t)))
            .unwrap_or(Duration::ZERO);

        if changed && cooldown_left.is_zero() {
            return MonitorAction::Reload;
        }
        if now.saturating_duration_since(self.last_ping) >= self.config.ping_interval() {
            return MonitorAction::Ping;
        }
        if changed {
            return MonitorAction::Deferred(cooldown_left);
        }
        MonitorAction::Idle
    }

    /// Decide and act once. The settle delay, if any, is slept here.
    pub fn step(&mut self, now: Instant) -> MonitorAction {
        let action = self.decide(self.signal.is_raised(), now);

        match action {
            MonitorAction::Reload => {
                self.signal.take();
                if !self.config.settle().is_zero() {
                    thread::sleep(self.config.settle());
                }
                let report = self.registry.broadcast(ReloadMessage::Reload.as_str());
                self.last_reload = Some(Instant::now());
                status_success(&format!("reload sent to {} client(s)", report.delivered));
                if report.pruned + report.failed > 0 {
                    debug!("reload"; "dropped {} dead client(s)", report.pruned + report.failed);
                }
            }
            MonitorAction::Ping => {
                let report = self.registry.broadcast(ReloadMessage::Ping.as_str());
                self.last_ping = now;
                let dropped = report.pruned + report.failed;
                debug!("reload"; "ping: {} alive, {} dropped", report.delivered, dropped);
            }
            MonitorAction::Deferred(left) => {
                debug!("reload"; "reload deferred {}ms (cooldown)", left.as_millis());
            }
            MonitorAction::Idle => {}
        }

        action
    }

    /// Loop until shutdown.
    pub fn run(&mut self, running: &Running) {
        log!("reload"; "monitor started");
        let interval = self.config.poll_interval();

        while running.is_running() {
            match self.step(Instant::now()) {
                MonitorAction::Deferred(left) => {
                    running.sleep(left.min(interval));
                }
                MonitorAction::Idle => {
                    self.signal.wait(interval);
                }
                MonitorAction::Reload | MonitorAction::Ping => {}
            }
        }
        debug!("reload"; "monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::frame::{self, Opcode};
    use crate::ws::RegistryLimits;
    use std::net::{TcpListener, TcpStream};

    fn config() -> ReloadConfig {
        ReloadConfig {
            cooldown_ms: 2000,
            settle_ms: 0,
            ping_interval_secs: 30,
            ..ReloadConfig::default()
        }
    }

    fn monitor() -> (ReloadMonitor, Arc<ChangeSignal>, Arc<ClientRegistry>) {
        let signal = Arc::new(ChangeSignal::new());
        let registry = Arc::new(ClientRegistry::new(RegistryLimits::default()));
        let monitor = ReloadMonitor::new(Arc::clone(&signal), Arc::clone(&registry), &config());
        (monitor, signal, registry)
    }

    #[test]
    fn test_decide_without_change() {
        let (monitor, _, _) = monitor();
        assert_eq!(monitor.decide(false, Instant::now()), MonitorAction::Idle);
    }

    #[test]
    fn test_decide_cooldown() {
        let (mut monitor, _, _) = monitor();
        let now = Instant::now();
        assert_eq!(monitor.decide(true, now), MonitorAction::Reload);

        monitor.last_reload = Some(now);
        let later = now + Duration::from_millis(500);
        assert_eq!(
            monitor.decide(true, later),
            MonitorAction::Deferred(Duration::from_millis(1500))
        );
        assert_eq!(monitor.decide(true, now + Duration::from_secs(2)), MonitorAction::Reload);
    }

    #[test]
    fn test_decide_ping_interval() {
        let (monitor, _, _) = monitor();
        let due = monitor.last_ping + Duration::from_secs(30);
        assert_eq!(monitor.decide(false, due), MonitorAction::Ping);
        // A ready reload wins over the keep-alive.
        assert_eq!(monitor.decide(true, due), MonitorAction::Reload);
    }

    #[test]
    fn test_step_broadcasts_reload_and_clears() {
        let (mut monitor, signal, registry) = monitor();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        registry.add(listener.accept().unwrap().0).unwrap();

        signal.raise();
        assert_eq!(monitor.step(Instant::now()), MonitorAction::Reload);
        assert!(!signal.is_raised());

        let frame = frame::read_frame(&mut client, 1024).unwrap();
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(frame.as_text(), Some("reload"));
    }

    #[test]
    fn test_change_during_cooldown_is_kept() {
        let (mut monitor, signal, _) = monitor();
        let now = Instant::now();

        signal.raise();
        assert_eq!(monitor.step(now), MonitorAction::Reload);

        signal.raise();
        let soon = Instant::now() + Duration::from_millis(100);
        assert!(matches!(monitor.step(soon), MonitorAction::Deferred(_)));
        assert!(signal.is_raised());

        let after = Instant::now() + Duration::from_secs(3);
        assert_eq!(monitor.step(after), MonitorAction::Reload);
        assert!(!signal.is_raised());
    }
}
