// file: src/ui.rs
// description: console status view subscribed to the live event stream

use crate::{
    dispatcher::{EventDispatcher, Subscription},
    events::Envelope,
    types::{
        AttackCompleted, AttackFailed, ConnectionClosed, ConnectionEstablished, MessageReceived,
        Notification, NotificationKind, ScanCompleted, ScanFailed, Severity,
        VulnerabilityDiscovered,
    },
};
use std::sync::Arc;

pub struct Colors;

impl Colors {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";
    pub const RED: &'static str = "\x1b[31m";
    pub const BRIGHT_RED: &'static str = "\x1b[91m";
    pub const BRIGHT_GREEN: &'static str = "\x1b[92m";
    pub const BRIGHT_YELLOW: &'static str = "\x1b[93m";
    pub const BRIGHT_MAGENTA: &'static str = "\x1b[95m";
    pub const BRIGHT_CYAN: &'static str = "\x1b[96m";
    pub const WHITE: &'static str = "\x1b[97m";
}

#[derive(Debug, Clone, Copy)]
pub struct StatusOptions {
    pub colored: bool,
    pub quiet: bool,
}

/// Prints one status line per event. One of potentially many dispatcher
/// consumers; it holds its subscriptions and nothing else.
pub struct StatusView {
    _subscriptions: Vec<Subscription>,
}

impl StatusView {
    pub fn attach(dispatcher: &Arc<EventDispatcher>, options: StatusOptions) -> Self {
        let mut subs = Vec::new();

        subs.push(dispatcher.on(move |ev: &ConnectionEstablished, _: &Envelope| {
            print_status(options, Colors::BRIGHT_GREEN, "ONLINE", &format!("live updates from {}", ev.url));
        }));
        subs.push(dispatcher.on(move |ev: &ConnectionClosed, _: &Envelope| {
            let reason = ev.reason.as_deref().unwrap_or("connection lost");
            print_error(options, "OFFLINE", reason);
        }));
        subs.push(dispatcher.on(move |ev: &Notification, _: &Envelope| {
            let color = match ev.kind {
                NotificationKind::Error => Colors::BRIGHT_RED,
                NotificationKind::Warning => Colors::BRIGHT_YELLOW,
                NotificationKind::Success => Colors::BRIGHT_GREEN,
                NotificationKind::Info => Colors::BRIGHT_CYAN,
            };
            print_status(options, color, "NOTICE", &format!("{}: {}", ev.title, ev.message));
        }));
        subs.push(dispatcher.on(move |ev: &VulnerabilityDiscovered, _: &Envelope| {
            let color = match ev.severity {
                Severity::Critical | Severity::High => Colors::BRIGHT_RED,
                Severity::Medium => Colors::BRIGHT_YELLOW,
                Severity::Low | Severity::Info => Colors::BRIGHT_CYAN,
            };
            print_status(options, color, "VULN", &format!("[{}] {}", ev.severity, ev.title));
        }));
        subs.push(dispatcher.on(move |ev: &ScanCompleted, _: &Envelope| {
            let findings = ev
                .vulnerabilities_found
                .map(|n| format!(", {n} findings"))
                .unwrap_or_default();
            print_status(options, Colors::BRIGHT_GREEN, "SCAN", &format!("{} completed{findings}", ev.scan_id));
        }));
        subs.push(dispatcher.on(move |ev: &ScanFailed, _: &Envelope| {
            let reason = ev.error.as_deref().unwrap_or("unknown error");
            print_error(options, "SCAN", &format!("{} failed: {reason}", ev.scan_id));
        }));
        subs.push(dispatcher.on(move |ev: &AttackCompleted, _: &Envelope| {
            print_status(options, Colors::BRIGHT_MAGENTA, "ATTACK", &format!("{} completed", ev.attack_id));
        }));
        subs.push(dispatcher.on(move |ev: &AttackFailed, _: &Envelope| {
            let reason = ev.error.as_deref().unwrap_or("unknown error");
            print_error(options, "ATTACK", &format!("{} failed: {reason}", ev.attack_id));
        }));
        subs.push(dispatcher.on(move |ev: &MessageReceived, _: &Envelope| {
            let from = ev.from.as_deref().unwrap_or("server");
            print_status(options, Colors::DIM, "MSG", &format!("{from}: {}", ev.message));
        }));

        Self {
            _subscriptions: subs,
        }
    }
}

fn print_status(options: StatusOptions, color: &str, label: &str, message: &str) {
    if options.quiet {
        return;
    }
    if options.colored {
        println!(
            "{}{}[{}]{} {}{}{}",
            Colors::BOLD,
            color,
            label,
            Colors::RESET,
            Colors::WHITE,
            message,
            Colors::RESET
        );
    } else {
        println!("[{label}] {message}");
    }
}

fn print_error(options: StatusOptions, label: &str, message: &str) {
    if options.colored {
        println!(
            "{}{}[{}]{} {}{}{}",
            Colors::BOLD,
            Colors::BRIGHT_RED,
            label,
            Colors::RESET,
            Colors::RED,
            message,
            Colors::RESET
        );
    } else {
        println!("[{label}] {message}");
    }
}
