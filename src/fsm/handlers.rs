//! Board-mode transition handlers.
//!
//! Each function here is an [`EventHandler`](crate::events::EventHandler)
//! or a [`TimerCallback`](crate::timer::TimerCallback) over any
//! [`BoardModeHost`].  Together they encode the transition table:
//!
//! | From                  | Trigger                 | To                 |
//! |-----------------------|-------------------------|--------------------|
//! | Off                   | boot command            | Booting            |
//! | Booting               | motor link alive        | Idle/Active        |
//! | Idle/Active..Dozing   | idle timer              | next idle submode  |
//! | Idle/ShuttingDown     | idle timer              | Off                |
//! | Idle, Riding          | shutdown command        | Idle/ShuttingDown  |
//! | Idle/ShuttingDown     | button up               | Idle/Active        |
//! | Idle (not Config)     | footpads pressed        | Riding (ladder)    |
//! | Idle                  | rpm ≠ 0                 | Riding (ladder)    |
//! | Idle                  | mode-config enable      | Idle/Config        |
//! | Idle/Config           | mode-config disable     | Idle/Active        |
//! | Riding                | pads empty and rpm 0    | Idle/Active        |
//! | Riding                | rpm or duty changed     | Riding (ladder)    |
//! | any                   | emergency fault         | Fault              |
//!
//! Subscription order is part of the contract: when several kinds are
//! pending, they are handled in queue order, and for a given kind this
//! controller runs before any peripheral registered after it.

use log::{debug, error, info, warn};

use crate::app::ports::MotorLink;
use crate::error::{BusError, EmergencyFault, TimerError};
use crate::events::{Event, EventBus, EventKind, EventQueue, ModeChange};
use crate::hysteresis::HysteresisState;

use super::{BoardMode, BoardModeHost, IdleSubmode, RidingSubmode};

// ───────────────────────────────────────────────────────────────
// Registration
// ───────────────────────────────────────────────────────────────

/// Register every controller handler on `bus`, in a fixed order.
pub fn subscribe<H: BoardModeHost>(
    bus: &mut EventBus<H>,
    queue: &EventQueue,
) -> Result<(), BusError> {
    bus.subscribe(EventKind::ButtonUp, on_command::<H>, queue)?;
    bus.subscribe(EventKind::CommandShutdown, on_command::<H>, queue)?;
    bus.subscribe(EventKind::CommandBoot, on_command::<H>, queue)?;
    bus.subscribe(EventKind::CommandModeConfig, on_command::<H>, queue)?;
    bus.subscribe(EventKind::RpmChanged, on_rpm_changed::<H>, queue)?;
    bus.subscribe(EventKind::EmergencyFault, on_emergency_fault::<H>, queue)?;
    bus.subscribe(EventKind::FootpadsChanged, on_footpads_changed::<H>, queue)?;
    bus.subscribe(EventKind::MotorLinkAlive, on_motor_link_alive::<H>, queue)?;
    bus.subscribe(EventKind::DutyCycleChanged, on_duty_cycle_changed::<H>, queue)?;
    info!("Board mode controller subscribed");
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Transition function
// ───────────────────────────────────────────────────────────────

/// Move to `next`, publish `ModeChanged`, and arm or cancel the idle timer
/// to match.  Does nothing if the board is already in `next`.
///
/// The power latch and the footpad sampler follow the mode only through
/// `ModeChanged`, so a transition that cannot be published is escalated
/// as an overflow fault instead of leaving them out of step.
pub fn set_mode<H: BoardModeHost>(host: &mut H, next: BoardMode, queue: &EventQueue) {
    let ctl = host.board_mode();
    let previous = ctl.mode;
    if previous == next {
        return;
    }
    ctl.mode = next;
    info!("Board mode: {} -> {}", previous, next);

    let change = ModeChange {
        mode: next,
        previous,
    };
    if queue.push(Event::ModeChanged(change)).is_err() {
        error!("Event queue full, ModeChanged to {} dropped", next);
        queue.fault(EmergencyFault::Overflow);
    }

    match next {
        BoardMode::Idle(sub) => match host.board_mode().idle_timeout(sub) {
            Some(ticks) => arm_idle_timer(host, ticks, queue),
            None => cancel_idle_timer(host),
        },
        _ => cancel_idle_timer(host),
    }
}

fn arm_idle_timer<H: BoardModeHost>(host: &mut H, ticks: u32, queue: &EventQueue) {
    cancel_idle_timer(host);
    match host.timers().set_timer(ticks, on_idle_timer::<H>, false) {
        Ok(id) => host.board_mode().idle_timer = Some(id),
        Err(TimerError::TableFull) => {
            error!("No timer slot for the idle cascade");
            queue.fault(EmergencyFault::Overflow);
        }
        Err(e) => {
            error!("Idle timer rejected: {}", e);
            queue.fault(EmergencyFault::InvalidArgument);
        }
    }
}

fn cancel_idle_timer<H: BoardModeHost>(host: &mut H) {
    if let Some(id) = host.board_mode().idle_timer.take() {
        // An expired one-shot is already gone; nothing else can fail here.
        if host.timers().cancel_timer(id).is_ok() {
            debug!("Idle timer {} cancelled", id.get());
        }
    }
}

/// Pick the riding submode from fresh motor-link readings.
///
/// All four latches see every sample, so the ladder falls back through
/// Warning when duty drops out of Danger while still above the warning
/// release point.
fn update_riding_submode<H: BoardModeHost>(host: &mut H, queue: &EventQueue) {
    let (rpm, duty) = {
        let motor = host.motor_link();
        (motor.rpm(), motor.duty_cycle())
    };
    let speed = rpm.unsigned_abs() as f32;

    let ctl = host.board_mode();
    if !ctl.mode.is_riding() {
        ctl.release_latches();
    }
    let danger = ctl.danger.apply(duty);
    let warning = ctl.warning.apply(duty);
    let normal = ctl.slow_rpm.apply(speed);
    let slow = ctl.stopped_rpm.apply(speed);

    let sub = if danger == HysteresisState::Set {
        RidingSubmode::Danger
    } else if warning == HysteresisState::Set {
        RidingSubmode::Warning
    } else if normal == HysteresisState::Set {
        RidingSubmode::Normal
    } else if slow == HysteresisState::Set {
        RidingSubmode::Slow
    } else {
        RidingSubmode::Stopped
    };
    set_mode(host, BoardMode::Riding(sub), queue);
}

// ───────────────────────────────────────────────────────────────
// Event handlers
// ───────────────────────────────────────────────────────────────

/// Boot, shutdown, mode-config and button-up.
pub fn on_command<H: BoardModeHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    let mode = host.board_mode().mode;
    match event {
        Event::CommandBoot => {
            if mode == BoardMode::Off {
                set_mode(host, BoardMode::Booting, queue);
            }
        }
        Event::CommandShutdown => match mode {
            // Riding is allowed: a stuck footpad sensor would otherwise
            // leave no way to power down.
            BoardMode::Idle(_) | BoardMode::Riding(_) => {
                set_mode(host, BoardMode::Idle(IdleSubmode::ShuttingDown), queue);
            }
            _ => debug!("Shutdown ignored in {}", mode),
        },
        Event::CommandModeConfig { enable: true } => {
            if mode.is_idle() {
                set_mode(host, BoardMode::Idle(IdleSubmode::Config), queue);
            } else {
                warn!("Config mode refused in {}", mode);
                if queue.push(Event::CommandNack).is_err() {
                    warn!("Event queue full, CommandNack dropped");
                }
            }
        }
        Event::CommandModeConfig { enable: false } => {
            if mode == BoardMode::Idle(IdleSubmode::Config) {
                set_mode(host, BoardMode::Idle(IdleSubmode::Active), queue);
            }
        }
        Event::ButtonUp(_) => {
            if mode == BoardMode::Idle(IdleSubmode::ShuttingDown) {
                info!("Shutdown aborted by button release");
                set_mode(host, BoardMode::Idle(IdleSubmode::Active), queue);
            }
        }
        _ => queue.fault(EmergencyFault::InvalidEvent),
    }
}

pub fn on_rpm_changed<H: BoardModeHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    let Event::RpmChanged(rpm) = *event else {
        queue.fault(EmergencyFault::InvalidEvent);
        return;
    };
    let mode = host.board_mode().mode;
    match mode {
        BoardMode::Idle(_) if rpm != 0 => update_riding_submode(host, queue),
        BoardMode::Riding(_) => {
            if rpm == 0 && host.footpads().is_empty() {
                set_mode(host, BoardMode::Idle(IdleSubmode::Active), queue);
            } else {
                update_riding_submode(host, queue);
            }
        }
        _ => {}
    }
}

pub fn on_duty_cycle_changed<H: BoardModeHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    if !matches!(event, Event::DutyCycleChanged(_)) {
        queue.fault(EmergencyFault::InvalidEvent);
        return;
    }
    if host.board_mode().mode.is_riding() {
        update_riding_submode(host, queue);
    }
}

pub fn on_emergency_fault<H: BoardModeHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    let Event::EmergencyFault(code) = *event else {
        queue.fault(EmergencyFault::InvalidEvent);
        return;
    };
    if host.board_mode().mode != BoardMode::Fault {
        error!("Entering fault mode: {}", code);
    }
    set_mode(host, BoardMode::Fault, queue);
}

pub fn on_footpads_changed<H: BoardModeHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    let Event::FootpadsChanged(pads) = *event else {
        queue.fault(EmergencyFault::InvalidEvent);
        return;
    };
    let mode = host.board_mode().mode;
    match mode {
        BoardMode::Idle(sub) if sub != IdleSubmode::Config && !pads.is_empty() => {
            update_riding_submode(host, queue);
        }
        BoardMode::Riding(_) if pads.is_empty() => {
            if host.motor_link().rpm() == 0 {
                set_mode(host, BoardMode::Idle(IdleSubmode::Active), queue);
            }
        }
        _ => {}
    }
}

pub fn on_motor_link_alive<H: BoardModeHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    if !matches!(event, Event::MotorLinkAlive) {
        queue.fault(EmergencyFault::InvalidEvent);
        return;
    }
    if host.board_mode().mode == BoardMode::Booting {
        set_mode(host, BoardMode::Idle(IdleSubmode::Active), queue);
    }
}

// ───────────────────────────────────────────────────────────────
// Timer callback
// ───────────────────────────────────────────────────────────────

/// Idle cascade step.  Fires once per armed idle timer.
pub fn on_idle_timer<H: BoardModeHost>(host: &mut H, _tick: u32, queue: &EventQueue) {
    let ctl = host.board_mode();
    // The expiring one-shot is released by the timer service after we return.
    ctl.idle_timer = None;
    let next = match ctl.mode {
        BoardMode::Idle(IdleSubmode::Active) => BoardMode::Idle(IdleSubmode::Default),
        BoardMode::Idle(IdleSubmode::Default) => BoardMode::Idle(IdleSubmode::Dozing),
        BoardMode::Idle(IdleSubmode::Dozing) => BoardMode::Idle(IdleSubmode::ShuttingDown),
        BoardMode::Idle(IdleSubmode::ShuttingDown) => BoardMode::Off,
        _ => return,
    };
    set_mode(host, next, queue);
}
