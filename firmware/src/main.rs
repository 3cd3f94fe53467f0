#![no_main]
#![no_std]

extern crate cortex_m;
extern crate cortex_m_rt as rt;

use rt::entry;
use core::fmt::Write;

use stm32g0xx_hal::{
    prelude::*,
    stm32::{self, interrupt},
    serial::Config,
    timer,
    i2c,
    analog::adc::{Precision, SampleTime},
};

use stm32g0xx_hal::rcc::{Config as RCCConfig, Prescaler};
use cortex_m::interrupt::Mutex;
use core::{cell::RefCell, ops::DerefMut, cell::UnsafeCell};

use vl6180x::VL6180X;

use analogsensor::{AnalogSensor, SensorConfig};

mod counter;
use counter::CSCounter;


static TIME_MS: CSCounter<u32> = CSCounter(UnsafeCell::new(0));
static TIMER1: Mutex<RefCell<Option<timer::Timer<stm32::TIM1>>>> = Mutex::new(RefCell::new(None));

use core::panic::PanicInfo;
use core::ptr;
use core::sync::atomic::{self, Ordering};

#[inline(never)]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    const GPIOB_BSRR: *mut u32 = 0x5000_0418 as *mut u32;
    const ON: u32 = 1_000;
    const OFF: u32 = 20_000;
    loop {
        unsafe {
            // turn on red led
            ptr::write_volatile(GPIOB_BSRR, 1 << 5);
            for _i in 1..ON {
                atomic::compiler_fence(Ordering::SeqCst);
            }

            // turn off red led
            ptr::write_volatile(GPIOB_BSRR, 1 << 21);
            for _i in 1..OFF {
                atomic::compiler_fence(Ordering::SeqCst);
            }
        }
    }
}

const LIGHT_SAMPLES: usize = 50;
const DISTANCE_SAMPLES: usize = 8;

/// Number of loop ticks spent ranging after the light changed
const NEW_RANGING: usize = 50;

/// Opening the flap moves the light level more than 500 counts off its average.
fn light_config() -> SensorConfig {
    SensorConfig::default()
        .with_sample_count(LIGHT_SAMPLES)
        .with_threshold_pct(500)
        .with_sample_interval_ms(200)
}

/// A letter on the bottom reads more than 10 mm closer than the empty box.
fn distance_config() -> SensorConfig {
    SensorConfig::default()
        .with_sample_count(DISTANCE_SAMPLES)
        .with_threshold_pct(-10)
        .with_direction_sensitive(true)
        .with_sample_interval_ms(20)
}

/// Channel id of the ToF ranging sensor
struct Range;

#[entry]
fn main() -> ! {

    let cp = cortex_m::Peripherals::take().unwrap();
    let dp = stm32::Peripherals::take().expect("cannot take peripherals");

    let mut rcc = dp.RCC.freeze(RCCConfig::hsi(Prescaler::Div16));
    #[cfg(feature = "low_power")]
    rcc.enable_low_power_mode();

    let mut delay = cp.SYST.delay(&mut rcc);

    let gpioa = dp.GPIOA.split(&mut rcc);
    let gpiob = dp.GPIOB.split(&mut rcc);

    let mut led1 = gpiob.pb5.into_push_pull_output(); // red
    let mut led2 = gpiob.pb9.into_push_pull_output(); // green

    led1.set_low().unwrap();
    led2.set_high().unwrap();

    let mut usart = {
        let tx = gpioa.pa9;
        let rx = gpioa.pa10;
        dp.USART1
        .usart(tx, rx, Config::default().baudrate(9600.bps()), &mut rcc)
        .unwrap()
    };

    writeln!(usart, "Start mailbox detector!\n").unwrap();

    // Configure the timer.
    let mut timer = dp.TIM1.timer(&mut rcc);
    timer.start(1.khz());
    timer.listen();

    cortex_m::interrupt::free(|cs| {
        *TIMER1.borrow(cs).borrow_mut() = Some(timer);
    });

    #[allow(unsafe_code)]
    unsafe {
        stm32::NVIC::unmask(stm32::Interrupt::TIM1_BRK_UP_TRG_COMP);
    }

    let mut adc = dp.ADC.constrain(&mut rcc);
    adc.set_sample_time(SampleTime::T_2);
    adc.set_precision(Precision::B_12);

    // photo transistor 2 = PA0
    let phototransistor2_pin = gpioa.pa0.into_analog();

    // I2C pins
    let scl = gpiob.pb6.into_open_drain_output();
    let sda = gpiob.pb7.into_open_drain_output();

    let i2c = dp
        .I2C1
        // for sys_clk = 1MHz => 400kHz
        .i2c(sda, scl, i2c::Config::with_timing(0x00000000), &mut rcc);

    let mut vl6180x = VL6180X::new(i2c).expect("vl6180x failed to intialize");
    writeln!(usart, "VL6180X init done..\n").unwrap();

    writeln!(usart, "Initializing sensor windows..").unwrap();

    let mut light: AnalogSensor<_, LIGHT_SAMPLES> = AnalogSensor::new(
        "light",
        phototransistor2_pin,
        light_config(),
        &mut adc,
        &TIME_MS,
    )
    .expect("light window");

    let mut distance: AnalogSensor<Range, DISTANCE_SAMPLES> = AnalogSensor::new_with(
        "distance",
        Range,
        distance_config(),
        &TIME_MS,
        |_| {
            vl6180x.start_ranging()?;
            delay.delay_ms(50_u16);
            vl6180x.read_range().map(i32::from)
        },
    )
    .expect("distance window");

    led2.set_low().unwrap();

    let stats = light.stats();
    writeln!(usart, "Done, distance: {}, light: {} \n start detector loop",
        distance.average(), stats.average).unwrap();

    let mut ranging: usize = 0;

    loop {

        if ranging == 0 {
            match light.sample_if_due(&mut adc, &TIME_MS) {
                Ok(true) => writeln!(usart, "plot {}", light.last_state()).unwrap(),
                Ok(false) => {},
                Err(err) => writeln!(usart, "light: {}", err).unwrap(),
            }

            if light.is_firing() {
                ranging = NEW_RANGING;
                led1.set_high().unwrap();
                writeln!(usart, "light changed: {:?}, start ranging", light.stats()).unwrap();
                vl6180x.start_ranging().unwrap();
            }
        }

        if ranging > 0 {
            let status = vl6180x.int_status().unwrap();
            if (status & 0b100) == 0b100 {
                let now = TIME_MS.get();
                let sampled = distance.sample_if_due_with(now, || {
                    vl6180x.read_range().map(i32::from)
                });
                vl6180x.clear_int().unwrap();

                match sampled {
                    Ok(true) => {
                        writeln!(usart, "plot {}, {}", 0, distance.last_state() * 10).unwrap();
                        if distance.is_firing() {
                            writeln!(usart, "Detect mail! {:?}", distance.stats()).unwrap();
                        }
                    }
                    Ok(false) => {},
                    Err(err) => writeln!(usart, "distance: {:?}", err).unwrap(),
                }
            }

            vl6180x.start_ranging().unwrap();
            ranging -= 1;
            delay.delay_ms(20_u16);

            if ranging == 0 {
                // the lid is closed again, take the new light level as baseline
                light.fill_all(&mut adc, &TIME_MS).unwrap();
                led1.set_low().unwrap();
                writeln!(usart, "ranging done, light baseline {}", light.average()).unwrap();
            }
        } else {
            delay.delay_ms(100_u16);
        }
    }
}



#[interrupt]
fn TIM1_BRK_UP_TRG_COMP() {
    cortex_m::interrupt::free(|cs| {
        if let Some(ref mut tim1) = TIMER1.borrow(cs).borrow_mut().deref_mut() {
            tim1.clear_irq();
            // count 1 millisecond
            TIME_MS.increment(cs);
        }
    });
}
