//! Raspberry Pi GPIO bindings for the hall sensor and the buzzer.
//!
//! Real hardware access is feature-gated so the crate still builds and runs
//! (with a simulated pedal) on machines without GPIO.

use crate::error::{BikeError, Result};
use crate::sensor::{PulseCounter, PulseEvent, PulseSource};
use crate::warning::Buzzer;
use std::sync::Arc;

/// Frequency of the buzzer tone (A4).
pub const BUZZER_FREQUENCY_HZ: f64 = 440.0;

/// Duty cycle used while the tone is on.
pub const BUZZER_DUTY_CYCLE: f64 = 0.5;

/// Whether real GPIO support was compiled in.
pub const fn gpio_available() -> bool {
    cfg!(feature = "gpio")
}

#[cfg(feature = "gpio")]
mod raspberry_pi {
    use super::*;
    use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
    use std::sync::Mutex;
    use tracing::{info, warn};

    /// Hall sensor on a pulled-up input pin, counting falling edges.
    pub struct HallSensor {
        // Dropping the pin would cancel the interrupt.
        _pin: Mutex<InputPin>,
        counter: Arc<PulseCounter>,
    }

    impl HallSensor {
        /// Claim `pin` and start recording pulses into `counter`.
        pub fn new(pin: u8, counter: Arc<PulseCounter>) -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| {
                BikeError::gpio_error(format!("Failed to initialize GPIO: {}", e))
            })?;

            let mut input = gpio
                .get(pin)
                .map_err(|e| BikeError::gpio_error(format!("Failed to access pin {}: {}", pin, e)))?
                .into_input_pullup();

            let sink = Arc::clone(&counter);
            input
                .set_async_interrupt(Trigger::FallingEdge, move |_level: Level| {
                    sink.record_pulse();
                })
                .map_err(|e| {
                    BikeError::gpio_error(format!("Failed to watch pin {} for edges: {}", pin, e))
                })?;

            info!("Hall sensor listening on GPIO {}", pin);
            Ok(Self {
                _pin: Mutex::new(input),
                counter,
            })
        }
    }

    impl PulseSource for HallSensor {
        fn latest(&self) -> Result<Option<PulseEvent>> {
            self.counter.latest()
        }
    }

    /// Piezo buzzer driven by software PWM.
    pub struct PwmBuzzer {
        pin: OutputPin,
    }

    impl PwmBuzzer {
        /// Claim `pin` as a low output.
        pub fn new(pin: u8) -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| {
                BikeError::gpio_error(format!("Failed to initialize GPIO: {}", e))
            })?;

            let mut output = gpio
                .get(pin)
                .map_err(|e| BikeError::gpio_error(format!("Failed to access pin {}: {}", pin, e)))?
                .into_output();
            output.set_low();

            info!("Buzzer ready on GPIO {}", pin);
            Ok(Self { pin: output })
        }
    }

    impl Buzzer for PwmBuzzer {
        fn set_tone(&mut self, on: bool) -> Result<()> {
            if on {
                self.pin
                    .set_pwm_frequency(BUZZER_FREQUENCY_HZ, BUZZER_DUTY_CYCLE)
                    .map_err(|e| BikeError::gpio_error(format!("Failed to start tone: {}", e)))
            } else {
                self.pin
                    .clear_pwm()
                    .map_err(|e| BikeError::gpio_error(format!("Failed to stop tone: {}", e)))?;
                self.pin.set_low();
                Ok(())
            }
        }
    }

    impl Drop for PwmBuzzer {
        fn drop(&mut self) {
            if let Err(e) = self.pin.clear_pwm() {
                warn!("Failed to release buzzer PWM: {}", e);
            }
            self.pin.set_low();
        }
    }
}

#[cfg(not(feature = "gpio"))]
mod mock {
    use super::*;

    /// Stand-in for builds without GPIO support; opening it always fails.
    pub struct HallSensor {
        counter: Arc<PulseCounter>,
    }

    impl HallSensor {
        pub fn new(pin: u8, _counter: Arc<PulseCounter>) -> Result<Self> {
            Err(BikeError::gpio_error(format!(
                "GPIO not available on this build (attempted to open sensor pin {})",
                pin
            )))
        }
    }

    impl PulseSource for HallSensor {
        fn latest(&self) -> Result<Option<PulseEvent>> {
            self.counter.latest()
        }
    }

    /// Stand-in for builds without GPIO support; opening it always fails.
    pub struct PwmBuzzer;

    impl PwmBuzzer {
        pub fn new(pin: u8) -> Result<Self> {
            Err(BikeError::gpio_error(format!(
                "GPIO not available on this build (attempted to open buzzer pin {})",
                pin
            )))
        }
    }

    impl Buzzer for PwmBuzzer {
        fn set_tone(&mut self, _on: bool) -> Result<()> {
            Err(BikeError::gpio_error("GPIO not available on this build"))
        }
    }
}

#[cfg(feature = "gpio")]
pub use raspberry_pi::{HallSensor, PwmBuzzer};

#[cfg(not(feature = "gpio"))]
pub use mock::{HallSensor, PwmBuzzer};

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "gpio"))]
    #[test]
    fn test_mock_hardware_refuses_to_open() {
        assert!(!gpio_available());

        let counter = Arc::new(PulseCounter::default());
        assert!(matches!(
            HallSensor::new(17, counter),
            Err(BikeError::Gpio(_))
        ));
        assert!(matches!(PwmBuzzer::new(18), Err(BikeError::Gpio(_))));
    }

    #[test]
    fn test_tone_constants() {
        assert_eq!(BUZZER_FREQUENCY_HZ, 440.0);
        assert!(BUZZER_DUTY_CYCLE > 0.0 && BUZZER_DUTY_CYCLE < 1.0);
    }
}
