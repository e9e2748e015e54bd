//! Button gestures turned into commands, and the settings pages.
//!
//! The processor sits between the button driver and the rest of the
//! board: it consumes `ButtonClick`/`ButtonHold` and publishes commands.
//! What a gesture means depends on the current [`CommandContext`].
//!
//! ## Default context
//!
//! | Gesture            | Action                               | Published                        |
//! |--------------------|--------------------------------------|----------------------------------|
//! | 1 click            | toggle headlights and status LEDs    | `CommandToggleLights`, `CommandAck` |
//! | 2 clicks           | toggle beeper                        | `CommandToggleBeeper`, `CommandAck` |
//! | hold               | power off (keep holding to confirm)  | `CommandShutdown`                |
//! | click, then hold   | open the settings pages              | `CommandModeConfig { enable: true }` |
//! | anything else      | none                                 | `CommandNack`                    |
//!
//! ## Settings pages (Idle/Config)
//!
//! | Input              | Action                               |
//! |--------------------|--------------------------------------|
//! | 1 click / 2 clicks | next / previous page                 |
//! | hold               | leave the settings pages             |
//! | click, then hold   | increase while held                  |
//! | 2 clicks, then hold| decrease while held                  |
//! | left / right pad   | increase / decrease while pressed    |
//! | release, pads off  | stop adjusting                       |
//!
//! Every adjustment step publishes `CommandSettingsChanged`.  Input is
//! ignored while the board is Off, Booting or in Fault.

use log::{debug, error, info, warn};

use crate::config::{Animation, BoardConfig, UserSettings};
use crate::error::{BusError, EmergencyFault, TimerError};
use crate::events::{CommandContext, Event, EventBus, EventKind, EventQueue, Footpads};
use crate::fsm::{BoardMode, IdleSubmode, ModeView};
use crate::timer::{TimerHost, TimerId};

/// Time for a brightness sweep from 0 to full.
pub const BRIGHTNESS_RANGE_MS: u32 = 3000;
pub const BRIGHTNESS_STEP_MS: u32 = 50;
/// Time for a hue sweep through the full circle.
pub const COLOR_RANGE_MS: u32 = 10_000;
pub const COLOR_STEP_MS: u32 = 20;
pub const ANIMATION_STEP_MS: u32 = 1000;

const BRIGHTNESS_STEP: f32 = BRIGHTNESS_STEP_MS as f32 / BRIGHTNESS_RANGE_MS as f32;
const COLOR_STEP: f32 = 360.0 * COLOR_STEP_MS as f32 / COLOR_RANGE_MS as f32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Increase,
    Decrease,
}

pub struct CommandProcessor {
    context: CommandContext,
    /// Direction and repeating timer of the adjustment in progress.
    adjusting: Option<(Adjustment, TimerId)>,
}

/// Context owning the processor, the user settings and the timer table.
pub trait CommandHost: TimerHost + ModeView {
    fn commands(&mut self) -> &mut CommandProcessor;
    fn settings_mut(&mut self) -> &mut UserSettings;
}

impl Default for CommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandProcessor {
    pub const fn new() -> Self {
        Self {
            context: CommandContext::Default,
            adjusting: None,
        }
    }

    pub fn context(&self) -> CommandContext {
        self.context
    }

    pub fn adjustment(&self) -> Option<Adjustment> {
        self.adjusting.map(|(adjustment, _)| adjustment)
    }

    pub fn is_adjusting(&self) -> bool {
        self.adjusting.is_some()
    }

    /// Back to the default context, forgetting any adjustment timer.  Used
    /// when the owner clears its timer table.
    pub fn reset(&mut self) {
        self.context = CommandContext::Default;
        self.adjusting = None;
    }
}

pub fn subscribe<H: CommandHost>(bus: &mut EventBus<H>, queue: &EventQueue) -> Result<(), BusError> {
    bus.subscribe(EventKind::ButtonClick, on_input::<H>, queue)?;
    bus.subscribe(EventKind::ButtonHold, on_input::<H>, queue)?;
    bus.subscribe(EventKind::ButtonUp, on_input::<H>, queue)?;
    bus.subscribe(EventKind::FootpadsChanged, on_input::<H>, queue)?;
    bus.subscribe(EventKind::ModeChanged, on_mode_changed::<H>, queue)?;
    info!("Command processor subscribed");
    Ok(())
}

fn publish(queue: &EventQueue, event: Event) {
    if queue.push(event).is_err() {
        warn!("Event queue full, {} dropped", event);
    }
}

// ───────────────────────────────────────────────────────────────
// Event handlers
// ───────────────────────────────────────────────────────────────

/// Gestures, button release and footpads, interpreted in the current
/// context.
pub fn on_input<H: CommandHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    if !matches!(
        event,
        Event::ButtonClick(_) | Event::ButtonHold(_) | Event::ButtonUp(_) | Event::FootpadsChanged(_)
    ) {
        queue.fault(EmergencyFault::InvalidEvent);
        return;
    }
    let mode = host.current_mode();
    if matches!(
        mode,
        BoardMode::Off | BoardMode::Booting | BoardMode::Fault | BoardMode::Unknown
    ) {
        debug!("{} ignored in {}", event, mode);
        return;
    }

    if host.commands().context == CommandContext::Default {
        on_default_input(host, event, queue);
    } else {
        on_page_input(host, event, queue);
    }
}

fn on_default_input<H: CommandHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    match *event {
        Event::ButtonClick(1) => {
            let settings = host.settings_mut();
            let on = !settings.enable_headlights;
            settings.enable_headlights = on;
            settings.enable_status_leds = on;
            info!("Lights {}", if on { "on" } else { "off" });
            publish(queue, Event::CommandToggleLights);
            publish(queue, Event::CommandAck);
        }
        Event::ButtonClick(2) => {
            let settings = host.settings_mut();
            settings.enable_beep = !settings.enable_beep;
            info!("Beeper {}", if settings.enable_beep { "on" } else { "off" });
            publish(queue, Event::CommandToggleBeeper);
            publish(queue, Event::CommandAck);
        }
        Event::ButtonHold(1) => publish(queue, Event::CommandShutdown),
        Event::ButtonHold(2) => publish(queue, Event::CommandModeConfig { enable: true }),
        Event::ButtonClick(_) | Event::ButtonHold(_) => publish(queue, Event::CommandNack),
        _ => {}
    }
}

fn on_page_input<H: CommandHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    match *event {
        Event::ButtonUp(_) => stop_adjusting(host),
        Event::ButtonClick(1) => {
            let next = host.commands().context.next();
            set_context(host, next, queue);
            publish(queue, Event::CommandAck);
        }
        Event::ButtonClick(2) => {
            let previous = host.commands().context.previous();
            set_context(host, previous, queue);
            publish(queue, Event::CommandAck);
        }
        Event::ButtonHold(1) => publish(queue, Event::CommandModeConfig { enable: false }),
        Event::ButtonHold(2) => start_adjusting(host, Adjustment::Increase, queue),
        Event::ButtonHold(3) => start_adjusting(host, Adjustment::Decrease, queue),
        Event::ButtonClick(_) | Event::ButtonHold(_) => publish(queue, Event::CommandNack),
        Event::FootpadsChanged(pads) => {
            if pads == Footpads::NONE {
                stop_adjusting(host);
            } else if pads == Footpads::LEFT {
                start_adjusting(host, Adjustment::Increase, queue);
            } else if pads == Footpads::RIGHT {
                start_adjusting(host, Adjustment::Decrease, queue);
            }
        }
        _ => {}
    }
}

/// Open the first page on entering Idle/Config; fall back to the default
/// context on leaving it.
pub fn on_mode_changed<H: CommandHost>(host: &mut H, event: &Event, queue: &EventQueue) {
    let Event::ModeChanged(change) = *event else {
        queue.fault(EmergencyFault::InvalidEvent);
        return;
    };
    let configuring = change.mode == BoardMode::Idle(IdleSubmode::Config);
    let context = host.commands().context;
    if context != CommandContext::Default && !configuring {
        publish(queue, Event::CommandNack);
        set_context(host, CommandContext::Default, queue);
    } else if context == CommandContext::Default && configuring {
        publish(queue, Event::CommandAck);
        set_context(host, CommandContext::PAGES[0], queue);
    }
}

fn set_context<H: CommandHost>(host: &mut H, context: CommandContext, queue: &EventQueue) {
    stop_adjusting(host);
    host.commands().context = context;
    info!("Command context {:?}", context);
    publish(queue, Event::CommandContextChanged(context));
}

// ───────────────────────────────────────────────────────────────
// Adjustment
// ───────────────────────────────────────────────────────────────

fn start_adjusting<H: CommandHost>(host: &mut H, adjustment: Adjustment, queue: &EventQueue) {
    stop_adjusting(host);
    let context = host.commands().context;
    let interval_ms = match context {
        CommandContext::Default => return,
        CommandContext::HeadlightBrightness | CommandContext::StatusBarBrightness => {
            BRIGHTNESS_STEP_MS
        }
        CommandContext::PersonalColor => COLOR_STEP_MS,
        _ => {
            // Animations move one step per press before repeating.
            step(host, context, adjustment, queue);
            ANIMATION_STEP_MS
        }
    };

    match host
        .timers()
        .set_timer(BoardConfig::ticks(interval_ms), on_adjust_timer::<H>, true)
    {
        Ok(id) => host.commands().adjusting = Some((adjustment, id)),
        Err(TimerError::TableFull) => {
            error!("No timer slot for the settings adjustment");
            queue.fault(EmergencyFault::Overflow);
        }
        Err(e) => {
            error!("Adjustment timer rejected: {}", e);
            queue.fault(EmergencyFault::InvalidArgument);
        }
    }
}

fn stop_adjusting<H: CommandHost>(host: &mut H) {
    if let Some((_, id)) = host.commands().adjusting.take() {
        if host.timers().cancel_timer(id).is_err() {
            debug!("Adjustment timer {} already gone", id.get());
        }
    }
}

/// One adjustment step, on the repeating timer.
pub fn on_adjust_timer<H: CommandHost>(host: &mut H, _tick: u32, queue: &EventQueue) {
    let processor = host.commands();
    if let Some((adjustment, _)) = processor.adjusting {
        let context = processor.context;
        step(host, context, adjustment, queue);
    }
}

fn step<H: CommandHost>(
    host: &mut H,
    context: CommandContext,
    adjustment: Adjustment,
    queue: &EventQueue,
) {
    let sign = match adjustment {
        Adjustment::Increase => 1.0,
        Adjustment::Decrease => -1.0,
    };
    let settings = host.settings_mut();
    match context {
        CommandContext::Default => return,
        CommandContext::HeadlightBrightness | CommandContext::StatusBarBrightness => {
            let value = if context == CommandContext::HeadlightBrightness {
                &mut settings.headlight_brightness
            } else {
                &mut settings.status_brightness
            };
            let target = *value + sign * BRIGHTNESS_STEP;
            if (0.0..=1.0).contains(&target) {
                *value = target;
            } else {
                *value = target.clamp(0.0, 1.0);
                publish(queue, Event::CommandNack);
            }
        }
        CommandContext::PersonalColor => {
            let mut hue = settings.personal_color + sign * COLOR_STEP;
            if hue >= 360.0 {
                hue -= 360.0;
            } else if hue < 0.0 {
                hue += 360.0;
            }
            settings.personal_color = hue;
        }
        _ => {
            if let Some(animation) = animation_mut(settings, context) {
                *animation = match adjustment {
                    Adjustment::Increase => animation.next(),
                    Adjustment::Decrease => animation.previous(),
                };
                debug!("{:?} is now {:?}", context, animation);
            }
            publish(queue, Event::CommandAck);
        }
    }
    publish(queue, Event::CommandSettingsChanged(context));
}

fn animation_mut(settings: &mut UserSettings, context: CommandContext) -> Option<&mut Animation> {
    match context {
        CommandContext::BootAnimation => Some(&mut settings.boot_animation),
        CommandContext::IdleAnimation => Some(&mut settings.idle_animation),
        CommandContext::DozingAnimation => Some(&mut settings.dozing_animation),
        CommandContext::RidingAnimation => Some(&mut settings.riding_animation),
        CommandContext::ShutdownAnimation => Some(&mut settings.shutdown_animation),
        _ => None,
    }
}
