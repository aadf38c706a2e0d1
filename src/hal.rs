//! ==============================================================================
//! hal.rs - Hardware Abstraction Layer
//! ==============================================================================
//!
//! purpose:
//!     one trait covering every driver the acquisition cycle talks to
//!     (1-wire bus, ADC channels, DHT22, i2c light/ORP sensors, GPIO).
//!     abstracts away the difference between running on a real Raspberry Pi
//!     (using `rppal` and the kernel w1 driver) and a development machine
//!     (using the mock).
//!
//! design philosophy:
//!     - "Compile Anywhere": the default build has no hardware dependency.
//!     - drivers return raw engineering units; the core never does
//!       calibration math.
//!     - every call blocks until the bus transaction is done.
//!
//! relationships:
//!     - used by: discovery.rs (1-wire presence), scheduler.rs (captures),
//!       station.rs (pin setup, calibration switch)
//!     - uses: rppal (on feature="hardware")
//!     - uses: std::process::Command (python DHT22 helper, hardware build)
//!
//! ==============================================================================

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use anyhow::{bail, Result};

use crate::fleet::records::{
    CurrentSensor, LightSensor, OneWireAddress, OpticalReading, OpticalSensor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

pub trait HardwareProvider: Send + Sync {
    fn set_gpio_mode(&self, pin: u8, mode: PinMode) -> Result<()>;
    fn read_digital(&self, pin: u8) -> Result<bool>;

    fn onewire_is_present(&self, bus_pin: u8, address: &OneWireAddress) -> bool;
    /// Starts a conversion on the bus and returns one temperature per address.
    fn onewire_read_temperatures(&self, bus_pin: u8, addresses: &[OneWireAddress]) -> Result<Vec<f32>>;

    fn read_dht22(&self, pin: u8) -> Result<(f32, f32)>;
    fn read_ph(&self, pin: u8) -> Result<f32>;
    fn read_orp(&self, address: u8) -> Result<f32>;
    fn read_light(&self, sensor: &LightSensor) -> Result<f32>;
    fn capture_optical(&self, sensor: &OpticalSensor) -> Result<OpticalReading>;
    /// One instantaneous sample; filtering happens in the scheduler.
    fn read_gas_ppm(&self, pin: u8) -> Result<f32>;
    fn read_current(&self, sensor: &CurrentSensor) -> Result<f32>;
}

// ==============================================================================================
// MOCK IMPLEMENTATION (For Non-Hardware Build and Tests)
// ==============================================================================================

/// Devices the mock can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockDevice {
    OneWire,
    Dht,
    Ph,
    Orp,
    Light,
    Digital,
    Optical,
    Gas,
    Current,
}

/// Plausible fixed readings. Every 1-wire address is present unless marked absent.
#[derive(Default)]
pub struct MockHal {
    absent: HashSet<OneWireAddress>,
    failing: HashSet<MockDevice>,
    digital: Mutex<HashMap<u8, bool>>,
    gas_samples: Mutex<VecDeque<f32>>,
}

impl MockHal {
    pub fn new() -> Self {
        tracing::info!("Using MOCK HAL (No hardware access)");
        Self::default()
    }

    pub fn with_absent(mut self, address: OneWireAddress) -> Self {
        self.absent.insert(address);
        self
    }

    pub fn with_failing(mut self, device: MockDevice) -> Self {
        self.failing.insert(device);
        self
    }

    /// Queues gas samples; once drained the mock falls back to 415 ppm.
    pub fn with_gas_samples(self, samples: &[f32]) -> Self {
        if let Ok(mut queue) = self.gas_samples.lock() {
            queue.extend(samples.iter().copied());
        }
        self
    }

    pub fn set_digital(&self, pin: u8, level: bool) {
        if let Ok(mut pins) = self.digital.lock() {
            pins.insert(pin, level);
        }
    }

    fn check(&self, device: MockDevice) -> Result<()> {
        if self.failing.contains(&device) {
            bail!("[MOCK] {device:?} not responding");
        }
        Ok(())
    }
}

impl HardwareProvider for MockHal {
    fn set_gpio_mode(&self, pin: u8, mode: PinMode) -> Result<()> {
        tracing::debug!("[MOCK GPIO] Pin {} set to {:?}", pin, mode);
        Ok(())
    }

    fn read_digital(&self, pin: u8) -> Result<bool> {
        self.check(MockDevice::Digital)?;
        let level = self
            .digital
            .lock()
            .map(|pins| pins.get(&pin).copied().unwrap_or(false))
            .unwrap_or(false);
        Ok(level)
    }

    fn onewire_is_present(&self, bus_pin: u8, address: &OneWireAddress) -> bool {
        tracing::debug!("[MOCK 1-WIRE] Bus {} probe {}", bus_pin, address);
        !self.absent.contains(address)
    }

    fn onewire_read_temperatures(&self, _bus_pin: u8, addresses: &[OneWireAddress]) -> Result<Vec<f32>> {
        self.check(MockDevice::OneWire)?;
        // surface probes sit a little warmer than the tank bottom
        Ok(addresses
            .iter()
            .enumerate()
            .map(|(i, _)| if i % 2 == 0 { 24.5 } else { 23.75 })
            .collect())
    }

    fn read_dht22(&self, pin: u8) -> Result<(f32, f32)> {
        self.check(MockDevice::Dht)?;
        tracing::debug!("[MOCK DHT22] Reading pin {}", pin);
        Ok((25.0, 50.0))
    }

    fn read_ph(&self, _pin: u8) -> Result<f32> {
        self.check(MockDevice::Ph)?;
        Ok(9.8)
    }

    fn read_orp(&self, _address: u8) -> Result<f32> {
        self.check(MockDevice::Orp)?;
        Ok(220.0)
    }

    fn read_light(&self, sensor: &LightSensor) -> Result<f32> {
        self.check(MockDevice::Light)?;
        tracing::debug!("[MOCK LUX] {:?} at 0x{:02X}", sensor.model, sensor.address);
        Ok(1250.0)
    }

    fn capture_optical(&self, _sensor: &OpticalSensor) -> Result<OpticalReading> {
        self.check(MockDevice::Optical)?;
        Ok(OpticalReading {
            pre_light: 3.0,
            red: 410.0,
            green: 380.0,
            blue: 150.0,
            white: 920.0,
        })
    }

    fn read_gas_ppm(&self, _pin: u8) -> Result<f32> {
        self.check(MockDevice::Gas)?;
        let queued = self.gas_samples.lock().ok().and_then(|mut q| q.pop_front());
        Ok(queued.unwrap_or(415.0))
    }

    fn read_current(&self, _sensor: &CurrentSensor) -> Result<f32> {
        self.check(MockDevice::Current)?;
        Ok(1.2)
    }
}

// ==============================================================================================
// REAL IMPLEMENTATION (For Raspberry Pi)
// ==============================================================================================
#[cfg(feature = "hardware")]
pub use rpi::RppalHal;

#[cfg(feature = "hardware")]
mod rpi {
    use std::path::PathBuf;
    use std::thread::sleep;
    use std::time::Duration;

    use anyhow::{anyhow, bail, Context, Result};
    use rppal::gpio::Gpio;
    use rppal::i2c::I2c;

    use super::{HardwareProvider, PinMode};
    use crate::fleet::records::{
        CurrentModel, CurrentSensor, LightModel, LightSensor, OneWireAddress, OpticalReading,
        OpticalSensor,
    };

    const W1_DEVICES: &str = "/sys/bus/w1/devices";
    /// ADS1115 on the default address; ADC "pins" are its four channels.
    const ADC_ADDRESS: u16 = 0x48;
    const ADC_FULL_SCALE_V: f32 = 4.096;
    /// Analog front ends run from 5V.
    const SUPPLY_V: f32 = 5.0;
    const LED_SETTLE: Duration = Duration::from_millis(200);

    pub struct RppalHal {
        gpio: Gpio,
    }

    impl RppalHal {
        pub fn new() -> Result<Self> {
            tracing::info!("Using REAL HARDWARE HAL (rppal)");
            Ok(Self {
                gpio: Gpio::new().context("gpio unavailable")?,
            })
        }

        fn w1_slave(address: &OneWireAddress) -> PathBuf {
            PathBuf::from(W1_DEVICES)
                .join(address.w1_device_name())
                .join("w1_slave")
        }

        fn read_ds18b20(address: &OneWireAddress) -> Result<f32> {
            // reading w1_slave triggers the conversion in the kernel driver
            let raw = std::fs::read_to_string(Self::w1_slave(address))
                .with_context(|| format!("probe {address} unreadable"))?;
            let mut lines = raw.lines();
            let crc_line = lines.next().unwrap_or_default();
            if !crc_line.trim_end().ends_with("YES") {
                bail!("probe {address} crc mismatch");
            }
            let milli = lines
                .next()
                .and_then(|l| l.split("t=").nth(1))
                .and_then(|t| t.trim().parse::<i32>().ok())
                .ok_or_else(|| anyhow!("probe {address} returned no temperature"))?;
            Ok(milli as f32 / 1000.0)
        }

        fn adc_volts(&self, channel: u8) -> Result<f32> {
            let mut i2c = I2c::new()?;
            i2c.set_slave_address(ADC_ADDRESS)?;
            // single shot, AINx vs GND, +-4.096V, 128 SPS, comparator off
            let mux = 0x04 | (channel & 0x03);
            let config_hi = 0x80 | (mux << 4) | 0x02 | 0x01;
            i2c.write(&[0x01, config_hi, 0x83])?;
            sleep(Duration::from_millis(9));
            let mut buf = [0u8; 2];
            i2c.write_read(&[0x00], &mut buf)?;
            let raw = i16::from_be_bytes(buf);
            Ok(raw as f32 * ADC_FULL_SCALE_V / 32768.0)
        }

        fn bh1750_lux(address: u8) -> Result<f32> {
            let mut i2c = I2c::new()?;
            i2c.set_slave_address(address as u16)?;
            i2c.write(&[0x20])?; // one-time high resolution
            sleep(Duration::from_millis(180));
            let mut buf = [0u8; 2];
            i2c.read(&mut buf)?;
            Ok(u16::from_be_bytes(buf) as f32 / 1.2)
        }

        fn max44009_lux(address: u8) -> Result<f32> {
            let mut i2c = I2c::new()?;
            i2c.set_slave_address(address as u16)?;
            let mut hi = [0u8; 1];
            let mut lo = [0u8; 1];
            i2c.write_read(&[0x03], &mut hi)?;
            i2c.write_read(&[0x04], &mut lo)?;
            let exponent = (hi[0] >> 4) as i32;
            let mantissa = (((hi[0] & 0x0F) << 4) | (lo[0] & 0x0F)) as f32;
            Ok(2f32.powi(exponent) * mantissa * 0.045)
        }
    }

    impl HardwareProvider for RppalHal {
        fn set_gpio_mode(&self, pin: u8, mode: PinMode) -> Result<()> {
            let p = self.gpio.get(pin)?;
            match mode {
                PinMode::Input => {
                    p.into_input();
                }
                PinMode::Output => {
                    let mut out = p.into_output_low();
                    out.set_reset_on_drop(false);
                }
            }
            Ok(())
        }

        fn read_digital(&self, pin: u8) -> Result<bool> {
            Ok(self.gpio.get(pin)?.into_input().is_high())
        }

        fn onewire_is_present(&self, _bus_pin: u8, address: &OneWireAddress) -> bool {
            // the w1-gpio overlay owns the bus pin; presence is the kernel's device list
            Self::w1_slave(address).exists()
        }

        fn onewire_read_temperatures(&self, _bus_pin: u8, addresses: &[OneWireAddress]) -> Result<Vec<f32>> {
            addresses.iter().map(Self::read_ds18b20).collect()
        }

        fn read_dht22(&self, pin: u8) -> Result<(f32, f32)> {
            // NOTE: DHT22 bit-banging is unreliable from userspace; the adafruit
            // helper handles the timing.
            use std::process::Command;
            let script = format!(
                r#"
import adafruit_dht, board, json, sys
try:
    dht = adafruit_dht.DHT22(board.D{})
    print(json.dumps({{"t": dht.temperature, "h": dht.humidity}}))
except Exception:
    print("null")
"#,
                pin
            );
            let output = Command::new("python3").args(["-c", &script]).output()?;
            let stdout = String::from_utf8_lossy(&output.stdout);
            if stdout.trim() == "null" {
                bail!("DHT22 read failed on pin {pin}");
            }
            let v: serde_json::Value = serde_json::from_str(&stdout)?;
            let t = v["t"].as_f64().ok_or_else(|| anyhow!("DHT22 missing temperature"))?;
            let h = v["h"].as_f64().ok_or_else(|| anyhow!("DHT22 missing humidity"))?;
            Ok((t as f32, h as f32))
        }

        fn read_ph(&self, pin: u8) -> Result<f32> {
            // gravity pH board: 0-14 pH maps to 0-4V
            Ok(3.5 * self.adc_volts(pin)?)
        }

        fn read_orp(&self, address: u8) -> Result<f32> {
            // EZO ORP circuit, ascii protocol
            let mut i2c = I2c::new()?;
            i2c.set_slave_address(address as u16)?;
            i2c.write(b"R")?;
            sleep(Duration::from_millis(900));
            let mut buf = [0u8; 16];
            i2c.read(&mut buf)?;
            if buf[0] != 1 {
                bail!("ORP 0x{address:02X} status {}", buf[0]);
            }
            let text: String = buf[1..]
                .iter()
                .take_while(|b| **b != 0)
                .map(|b| *b as char)
                .collect();
            text.trim()
                .parse()
                .with_context(|| format!("ORP 0x{address:02X} sent {text:?}"))
        }

        fn read_light(&self, sensor: &LightSensor) -> Result<f32> {
            match sensor.model {
                LightModel::Bh1750 => Self::bh1750_lux(sensor.address),
                LightModel::Max44009 => Self::max44009_lux(sensor.address),
            }
        }

        fn capture_optical(&self, sensor: &OpticalSensor) -> Result<OpticalReading> {
            let mut red = self.gpio.get(sensor.led_red)?.into_output_low();
            let mut green = self.gpio.get(sensor.led_green)?.into_output_low();
            let mut blue = self.gpio.get(sensor.led_blue)?.into_output_low();

            let mut measure = |r: bool, g: bool, b: bool| -> Result<f32> {
                red.write(r.into());
                green.write(g.into());
                blue.write(b.into());
                sleep(LED_SETTLE);
                Self::bh1750_lux(sensor.address)
            };

            let reading = OpticalReading {
                pre_light: measure(false, false, false)?,
                red: measure(true, false, false)?,
                green: measure(false, true, false)?,
                blue: measure(false, false, true)?,
                white: measure(true, true, true)?,
            };
            // dropping the pins resets them low
            Ok(reading)
        }

        fn read_gas_ppm(&self, pin: u8) -> Result<f32> {
            // MG-811 module: output falls as CO2 rises
            let volts = self.adc_volts(pin)?;
            Ok(volts * (-3157.89) + 1420.0)
        }

        fn read_current(&self, sensor: &CurrentSensor) -> Result<f32> {
            const SAMPLES: usize = 50;
            let mid = SUPPLY_V / 2.0;
            let mut sum_sq = 0.0f32;
            for _ in 0..SAMPLES {
                let v = self.adc_volts(sensor.pin)? - mid;
                sum_sq += v * v;
            }
            let rms_v = (sum_sq / SAMPLES as f32).sqrt();
            let amps = match sensor.model {
                CurrentModel::Acs712 => {
                    let volts_per_amp = match sensor.variant {
                        5 => 0.185,
                        20 => 0.100,
                        _ => 0.066,
                    };
                    rms_v / volts_per_amp
                }
                CurrentModel::Sct013 => rms_v * sensor.variant as f32,
            };
            Ok(amps)
        }
    }
}
