#![no_std]
#![no_main]

use core::cell::RefCell;

use assign_resources::assign_resources;
use embassy_executor::{Executor, Spawner};
use embassy_futures::yield_now;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::multicore::{Stack, spawn_core1};
use embassy_rp::{bind_interrupts, peripherals, peripherals::USB as pUSB};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Ticker, block_for};
use embassy_usb_logger::ReceiverHandler;
use panic_probe as _;
use static_cell::StaticCell;
use stepper_brain::prelude::*;

static mut CORE1_STACK: Stack<{ 2 << 15 }> = Stack::new();
static EXECUTOR0: StaticCell<Executor> = StaticCell::new();
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();

/// Complete lines from USB, handed from core 0 to the motion loop on core 1.
static LINE_CHANNEL: Channel<CriticalSectionRawMutex, Line, 8> = Channel::new();

const LIMIT_A: LimitSwitch = LimitSwitch(0);
const LIMIT_B: LimitSwitch = LimitSwitch(1);

bind_interrupts!(struct Irqs {
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<pUSB>;
});

assign_resources! {
    c0: Core0Resources {
        usb: USB,
        led: PIN_25,
    }

    c1: Core1Resources {
        x_step: PIN_0,
        x_dir: PIN_1,
        y_step: PIN_2,
        y_dir: PIN_3,
        z_step: PIN_4,
        z_dir: PIN_5,

        limit_a: PIN_16,
        limit_b: PIN_17,
    }
}

#[cortex_m_rt::entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());
    let r = split_resources!(p);

    spawn_core1(
        p.CORE1,
        unsafe { &mut *core::ptr::addr_of_mut!(CORE1_STACK) },
        move || {
            let executor1 = EXECUTOR1.init(Executor::new());
            executor1.run(move |spawner| {
                if let Err(err) = spawner.spawn(core1_main(r.c1)) {
                    log::error!("failed to start motion loop: {:?}", err);
                }
            });
        },
    );

    let executor0 = EXECUTOR0.init(Executor::new());
    executor0.run(move |spawner| {
        if let Err(err) = spawner.spawn(core0_main(r.c0, spawner)) {
            log::error!("failed to start core 0: {:?}", err);
        }
    });
}

#[embassy_executor::task]
async fn core0_main(r: Core0Resources, spawner: Spawner) {
    let usb_driver = embassy_rp::usb::Driver::new(r.usb, Irqs);
    if let Err(err) = spawner.spawn(usb_comm_task(usb_driver)) {
        log::error!("failed to start usb: {:?}", err);
    }

    let mut led = Output::new(r.led, Level::Low);

    let mut ticker = Ticker::every(Duration::from_millis(500));
    loop {
        led.toggle();

        ticker.next().await;
    }
}

/// Step and direction pins for each axis plus the two limit switches.
struct MotionIO {
    step: [Output<'static>; 3],
    dir: [Output<'static>; 3],
    limits: [Input<'static>; 2],
}

impl MotionIO {
    fn new(r: Core1Resources) -> Self {
        Self {
            step: [
                Output::new(r.x_step, Level::Low),
                Output::new(r.y_step, Level::Low),
                Output::new(r.z_step, Level::Low),
            ],
            dir: [
                Output::new(r.x_dir, Level::Low),
                Output::new(r.y_dir, Level::Low),
                Output::new(r.z_dir, Level::Low),
            ],
            limits: [
                Input::new(r.limit_a, Pull::Up),
                Input::new(r.limit_b, Pull::Up),
            ],
        }
    }
}

impl StepOutput for MotionIO {
    fn step(&mut self, axis: Axis, direction: Direction) {
        let i = axis.index();

        self.dir[i].set_level(match direction {
            Direction::Forward => Level::High,
            Direction::Backward => Level::Low,
        });
        self.step[i].set_high();
        block_for(Duration::from_micros(2));
        self.step[i].set_low();
    }
}

impl LimitInput for MotionIO {
    // switches close to ground
    fn is_triggered(&self, switch: LimitSwitch) -> bool {
        self.limits
            .get(switch.0 as usize)
            .is_some_and(|pin| pin.is_low())
    }
}

#[embassy_executor::task]
async fn core1_main(r: Core1Resources) {
    let mut io = MotionIO::new(r);

    let mut system = match MotionSystem::new(MachineSettings::default()) {
        Ok(system) => system,
        Err(err) => {
            log::error!("rejected machine settings: {}", err);
            return;
        }
    };

    if let Err(err) = system.start_calibration(Axis::X, LIMIT_A, LIMIT_B) {
        log::error!("could not start calibration: {}", err);
    }

    loop {
        if let Ok(line) = LINE_CHANNEL.try_receive() {
            dispatch(&mut system, &line);
        }

        if let Some(status) = system.tick(&mut io, Instant::now()) {
            log::info!("calibration finished: {:?}", status);
        }

        yield_now().await;
    }
}

/// Comma-separated lines are motion messages, everything else is a command.
fn dispatch(system: &mut MotionSystem, line: &str) {
    if line.contains(',') {
        match system.handle_message(line) {
            Ok(targets) => log::info!("moving to {:?}", targets),
            Err(err) => log::info!("!!{}", err),
        }
    } else {
        log::info!("{}", system.handle_command(line));
    }
}

struct Handler {
    lines: RefCell<LineBuffer>,
}

impl ReceiverHandler for Handler {
    async fn handle_data(&self, data: &[u8]) {
        let mut lines = self.lines.borrow_mut();
        for line in lines.feed(data) {
            if LINE_CHANNEL.try_send(line).is_err() {
                log::warn!("line queue full, dropping line");
            }
        }
    }

    fn new() -> Self {
        Self {
            lines: RefCell::new(LineBuffer::new()),
        }
    }
}

#[embassy_executor::task]
async fn usb_comm_task(driver: embassy_rp::usb::Driver<'static, pUSB>) {
    embassy_usb_logger::run!({ 2 << 12 }, log::LevelFilter::Info, driver, Handler);
}
