//! Board context: the owned state every handler runs against.
//!
//! [`Board`] owns the timer table, the mode controller, the command
//! processor with the user settings, and the peripheral modules, and
//! implements each module's host trait.  The event bus lives next to it
//! rather than inside it, so dispatch can lend the board to handlers
//! mutably:
//!
//! ```text
//!  ISR ──push──▶ EventQueue ──▶ EventBus<Board>::drain(&queue, &mut board)
//!                                   │
//!         ┌───────────────┬─────────┴──────────┬───────────────────────┐
//!         ▼               ▼                    ▼                       ▼
//!   TimerService  BoardModeController  Button ─▶ CommandProcessor  Power · Footpads
//!                         │                          │               · Headlights
//!                 MotorLink (port)             UserSettings     FootpadSensor (port)
//! ```

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::pwm::SetDutyCycle;
use log::info;

use crate::config::{BoardConfig, UserSettings};
use crate::drivers::button::{self, Button, ButtonHost};
use crate::drivers::headlights::{self, Headlights, HeadlightsHost};
use crate::drivers::power::{self, PowerControl, PowerHost};
use crate::error::{EmergencyFault, Error, Result};
use crate::events::{Event, EventBus, EventKind, EventQueue, Footpads};
use crate::fsm::{self, BoardMode, BoardModeController, BoardModeHost, ModeView};
use crate::sensors::footpads::{self, FootpadSampler, FootpadsHost};
use crate::timer::{self, TimerHost, TimerService};

use super::commands::{self, CommandHost, CommandProcessor};
use super::ports::{FootpadSensor, MotorLink};

// ───────────────────────────────────────────────────────────────
// Board
// ───────────────────────────────────────────────────────────────

/// Type parameters: motor link, footpad sensor, power pin, button pin,
/// headlight PWM channel, headlight direction pin.
pub struct Board<M, F, P, B, W, D> {
    timers: TimerService<Self>,
    controller: BoardModeController,
    footpads: FootpadSampler,
    power: PowerControl<P>,
    button: Button<B>,
    commands: CommandProcessor,
    settings: UserSettings,
    headlights: Headlights<W, D>,
    motor: M,
    sensor: F,
}

impl<M, F, P, B, W, D> Board<M, F, P, B, W, D>
where
    M: MotorLink,
    F: FootpadSensor,
    P: OutputPin,
    B: InputPin,
    W: SetDutyCycle,
    D: OutputPin,
{
    /// Build the board context.  Does **not** subscribe anything; call
    /// [`init`](Self::init) next.
    pub fn new(
        config: &BoardConfig,
        motor: M,
        sensor: F,
        power_pin: P,
        button_pin: B,
        headlights: Headlights<W, D>,
    ) -> Result<Self> {
        Ok(Self {
            timers: TimerService::new(),
            controller: BoardModeController::new(config)?,
            footpads: FootpadSampler::new(config),
            power: PowerControl::new(power_pin),
            button: Button::new(button_pin),
            commands: CommandProcessor::new(),
            settings: UserSettings::default(),
            headlights,
            motor,
            sensor,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Release the power latch, darken the headlights, and register every
    /// module on `bus`.
    ///
    /// Order matters and is fixed: timer tick, board mode, power,
    /// footpads, button, commands, headlights.  For `ModeChanged` the power
    /// latch therefore reacts before footpad sampling starts, and a button
    /// release reaches the mode controller before the command processor.
    pub fn init(&mut self, bus: &mut EventBus<Self>, queue: &EventQueue) -> Result<()> {
        if self.power.off().is_err() {
            queue.fault(EmergencyFault::InitFail);
            return Err(Error::Hardware("power latch"));
        }
        if let Err(e) = self.headlights.switch_off() {
            queue.fault(EmergencyFault::InitFail);
            return Err(e);
        }

        bus.subscribe(EventKind::SysTick, timer::on_system_tick::<Self>, queue)?;
        fsm::handlers::subscribe(bus, queue)?;
        power::subscribe(bus, queue)?;
        footpads::subscribe(bus, queue)?;
        button::subscribe(bus, queue)?;
        commands::subscribe(bus, queue)?;
        headlights::subscribe(bus, queue)?;

        info!(
            "Board initialised: {} subscriptions, {} timer slots",
            bus.len(),
            self.timers.capacity()
        );
        Ok(())
    }

    /// Request boot.  The power button latches the supply, so by the time
    /// this runs the user has already asked for the board to start.
    pub fn boot(&self, queue: &EventQueue) -> Result<()> {
        queue.push(Event::CommandBoot)?;
        Ok(())
    }

    /// Return to `Off` as after a fresh start: drop every timer, forget
    /// footpad, button, ladder and settings-page state, release the power
    /// latch and darken the headlights.  User settings are kept.
    pub fn reset(&mut self) -> Result<()> {
        self.timers.clear();
        self.controller.reset();
        self.footpads.reset();
        self.button.reset();
        self.commands.reset();
        self.headlights.reset();
        self.power
            .off()
            .map_err(|_| Error::Hardware("power latch"))?;
        self.headlights.switch_off()?;
        info!("Board reset to {}", self.controller.mode());
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current board mode.
    pub fn mode(&self) -> BoardMode {
        self.controller.mode()
    }

    pub fn controller(&self) -> &BoardModeController {
        &self.controller
    }

    pub fn timer_service(&self) -> &TimerService<Self> {
        &self.timers
    }

    /// Footpad mask last published by the sampler.
    pub fn footpad_state(&self) -> Footpads {
        self.footpads.state()
    }

    pub fn power_is_on(&self) -> bool {
        self.power.is_on()
    }

    pub fn button(&self) -> &Button<B> {
        &self.button
    }

    pub fn commands(&self) -> &CommandProcessor {
        &self.commands
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    pub fn headlights(&self) -> &Headlights<W, D> {
        &self.headlights
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    pub fn motor_mut(&mut self) -> &mut M {
        &mut self.motor
    }

    pub fn sensor_mut(&mut self) -> &mut F {
        &mut self.sensor
    }
}

// ───────────────────────────────────────────────────────────────
// Host trait impls
// ───────────────────────────────────────────────────────────────

impl<M, F, P, B, W, D> TimerHost for Board<M, F, P, B, W, D> {
    fn timers(&mut self) -> &mut TimerService<Self> {
        &mut self.timers
    }
}

impl<M, F, P, B, W, D> ModeView for Board<M, F, P, B, W, D> {
    fn current_mode(&self) -> BoardMode {
        self.controller.mode()
    }
}

impl<M: MotorLink, F, P, B, W, D> BoardModeHost for Board<M, F, P, B, W, D> {
    type Motor = M;

    fn board_mode(&mut self) -> &mut BoardModeController {
        &mut self.controller
    }

    fn motor_link(&self) -> &M {
        &self.motor
    }

    fn footpads(&self) -> Footpads {
        self.footpads.state()
    }
}

impl<M, F: FootpadSensor, P, B, W, D> FootpadsHost for Board<M, F, P, B, W, D> {
    type Sensor = F;

    fn footpad_sampler(&mut self) -> &mut FootpadSampler {
        &mut self.footpads
    }

    fn footpad_sensor(&mut self) -> &mut F {
        &mut self.sensor
    }
}

impl<M, F, P: OutputPin, B, W, D> PowerHost for Board<M, F, P, B, W, D> {
    type Pin = P;

    fn power(&mut self) -> &mut PowerControl<P> {
        &mut self.power
    }
}

impl<M, F, P, B: InputPin, W, D> ButtonHost for Board<M, F, P, B, W, D> {
    type Pin = B;

    fn button(&mut self) -> &mut Button<B> {
        &mut self.button
    }
}

impl<M, F, P, B, W, D> CommandHost for Board<M, F, P, B, W, D> {
    fn commands(&mut self) -> &mut CommandProcessor {
        &mut self.commands
    }

    fn settings_mut(&mut self) -> &mut UserSettings {
        &mut self.settings
    }
}

impl<M, F, P, B, W: SetDutyCycle, D: OutputPin> HeadlightsHost for Board<M, F, P, B, W, D> {
    type Pwm = W;
    type Pin = D;

    fn headlights(&mut self) -> &mut Headlights<W, D> {
        &mut self.headlights
    }

    fn user_settings(&self) -> UserSettings {
        self.settings
    }
}
