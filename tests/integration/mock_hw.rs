//! Mock hardware and a board harness for integration tests.
//!
//! The mocks hand out shared handles so a test keeps control of the motor
//! telemetry, pad voltages, button and pin levels after the [`Board`] has
//! taken ownership of them.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};
use lcm::app::ports::{FootpadSensor, MotorLink};
use lcm::drivers::button::{DEBOUNCE_TICKS, HOLD_MS, REPEAT_WINDOW_MS};
use lcm::drivers::headlights::Headlights;
use lcm::events::ModeChange;
use lcm::{Board, BoardConfig, BoardMode, Event, EventBus, EventQueue};

// ── Motor link ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockMotorLink {
    rpm: Rc<Cell<i32>>,
    duty: Rc<Cell<f32>>,
}

impl MotorLink for MockMotorLink {
    fn rpm(&self) -> i32 {
        self.rpm.get()
    }

    fn duty_cycle(&self) -> f32 {
        self.duty.get()
    }
}

// ── Footpads ──────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockFootpads {
    left: Rc<Cell<f32>>,
    right: Rc<Cell<f32>>,
    reads: Rc<Cell<u32>>,
}

impl FootpadSensor for MockFootpads {
    fn left_volts(&mut self) -> f32 {
        self.reads.set(self.reads.get() + 1);
        self.left.get()
    }

    fn right_volts(&mut self) -> f32 {
        self.right.get()
    }
}

// ── Output pins (power latch, headlight direction) ────────────

#[derive(Clone, Default)]
pub struct MockPin {
    high: Rc<Cell<bool>>,
    writes: Rc<Cell<u32>>,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high.set(false);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high.set(true);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

// ── Button ────────────────────────────────────────────────────

/// Active-low push button; `pressed` pulls the line low.
#[derive(Clone, Default)]
pub struct MockButton {
    pressed: Rc<Cell<bool>>,
}

impl ErrorType for MockButton {
    type Error = Infallible;
}

impl InputPin for MockButton {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(!self.pressed.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(self.pressed.get())
    }
}

// ── Headlight PWM ─────────────────────────────────────────────

pub const PWM_MAX: u16 = 1000;

#[derive(Clone, Default)]
pub struct MockPwm {
    duty: Rc<Cell<u16>>,
}

impl pwm::ErrorType for MockPwm {
    type Error = Infallible;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        PWM_MAX
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.duty.set(duty);
        Ok(())
    }
}

/// Headlights on fresh mocks, for tests that build their own board.
pub fn mock_headlights() -> Headlights<MockPwm, MockPin> {
    Headlights::new(MockPwm::default(), MockPin::default(), MockPin::default())
        .expect("direction band is valid")
}

// ── Harness ───────────────────────────────────────────────────

pub type TestBoard =
    Board<MockMotorLink, MockFootpads, MockPin, MockButton, MockPwm, MockPin>;

/// Ticks from a button level change until its edge has been handled.
pub const BUTTON_SETTLE: u32 = DEBOUNCE_TICKS + 2;

pub struct Harness {
    pub queue: EventQueue,
    pub bus: EventBus<TestBoard>,
    pub board: TestBoard,
    pub config: BoardConfig,
    motor: MockMotorLink,
    pads: MockFootpads,
    pin: MockPin,
    button: MockButton,
    pwm: MockPwm,
    forward: MockPin,
    reverse: MockPin,
    /// Every non-tick event delivered so far.
    pub delivered: Vec<Event>,
    tick: u32,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_config(BoardConfig::default())
    }

    pub fn with_config(config: BoardConfig) -> Self {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();

        let motor = MockMotorLink::default();
        let pads = MockFootpads::default();
        let pin = MockPin::default();
        let button = MockButton::default();
        let pwm = MockPwm::default();
        let forward = MockPin::default();
        let reverse = MockPin::default();
        let headlights = Headlights::new(pwm.clone(), forward.clone(), reverse.clone())
            .expect("direction band is valid");
        let queue = EventQueue::new();
        let mut bus = EventBus::new();
        let mut board = Board::new(
            &config,
            motor.clone(),
            pads.clone(),
            pin.clone(),
            button.clone(),
            headlights,
        )
        .expect("default config is valid");
        board.init(&mut bus, &queue).expect("init succeeds");

        Self {
            queue,
            bus,
            board,
            config,
            motor,
            pads,
            pin,
            button,
            pwm,
            forward,
            reverse,
            delivered: Vec::new(),
            tick: 0,
        }
    }

    /// Dispatch everything pending.
    pub fn drain(&mut self) {
        while let Some(ev) = self.bus.pop_and_notify(&self.queue, &mut self.board) {
            if !matches!(ev, Event::SysTick(_)) {
                self.delivered.push(ev);
            }
        }
    }

    pub fn push(&mut self, event: Event) {
        self.queue.push(event).expect("queue has room");
        self.drain();
    }

    /// Advance `n` system ticks, draining after each.
    pub fn tick(&mut self, n: u32) {
        for _ in 0..n {
            self.tick += 1;
            self.queue
                .push(Event::SysTick(self.tick))
                .expect("queue drained every tick");
            self.drain();
        }
    }

    /// Tick until the footpad sampler has certainly run once more.
    pub fn sample_footpads(&mut self) {
        let n = self.config.footpad_sample_interval_ms;
        self.tick(n);
    }

    pub fn mode(&self) -> BoardMode {
        self.board.mode()
    }

    /// Boot and bring the motor link up: ends in Idle/Active.
    pub fn boot_to_idle(&mut self) {
        self.board.boot(&self.queue).expect("queue has room");
        self.drain();
        self.push(Event::MotorLinkAlive);
    }

    pub fn set_motor(&mut self, rpm: i32, duty: f32) {
        self.motor.rpm.set(rpm);
        self.motor.duty.set(duty);
    }

    /// Update telemetry and publish it the way the motor link does.
    pub fn telemetry(&mut self, rpm: i32, duty: f32) {
        self.set_motor(rpm, duty);
        self.push(Event::RpmChanged(rpm));
        self.push(Event::DutyCycleChanged(duty));
    }

    pub fn set_pads(&mut self, left: f32, right: f32) {
        self.pads.left.set(left);
        self.pads.right.set(right);
    }

    pub fn pad_reads(&self) -> u32 {
        self.pads.reads.get()
    }

    pub fn power_high(&self) -> bool {
        self.pin.high.get()
    }

    pub fn power_writes(&self) -> u32 {
        self.pin.writes.get()
    }

    /// Press the button and wait until the press has been debounced.
    pub fn button_down(&mut self) {
        self.button.pressed.set(true);
        self.push(Event::ButtonWakeup);
        self.tick(BUTTON_SETTLE);
    }

    /// Release the button and wait until the release has been debounced.
    pub fn button_up(&mut self) {
        self.button.pressed.set(false);
        self.push(Event::ButtonWakeup);
        self.tick(BUTTON_SETTLE);
    }

    /// `n` short presses, then long enough for the click to be reported.
    pub fn click(&mut self, n: u8) {
        self.presses(n - 1);
        self.button_down();
        self.tick(50);
        self.button_up();
        self.tick(REPEAT_WINDOW_MS);
    }

    /// `n - 1` short presses and a held one, left held once the hold has
    /// been reported.
    pub fn hold(&mut self, n: u8) {
        self.presses(n - 1);
        self.button_down();
        self.tick(HOLD_MS);
    }

    fn presses(&mut self, n: u8) {
        for _ in 0..n {
            self.button_down();
            self.tick(50);
            self.button_up();
            self.tick(50);
        }
    }

    pub fn headlight_duty(&self) -> u16 {
        self.pwm.duty.get()
    }

    /// Levels of the forward and reverse direction pins.
    pub fn headlight_pins(&self) -> (bool, bool) {
        (self.forward.high.get(), self.reverse.high.get())
    }

    /// Mode changes delivered so far, oldest first.
    pub fn mode_changes(&self) -> Vec<ModeChange> {
        self.delivered
            .iter()
            .filter_map(|ev| match ev {
                Event::ModeChanged(change) => Some(*change),
                _ => None,
            })
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.delivered.clear();
    }
}
