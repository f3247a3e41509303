use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    Red,
    Green,
}

/// Commands the device understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    Ping,
    SetLed { led: Led, on: bool },
    /// Blink the green LED `n` times per second, 0 stops blinking
    LedFrequency(u32),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("command '{0}' is not implemented")]
    NotImplemented(String),

    #[error("invalid argument for {command}: '{argument}'")]
    InvalidArgument {
        command: &'static str,
        argument: String,
    },
}

impl DeviceCommand {
    /// Recognize a command by keyword anywhere in `text`, ignoring case. The
    /// word following the keyword is the argument.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let text = text.to_lowercase();
        let invalid = |command: &'static str, argument: &str| CommandError::InvalidArgument {
            command,
            argument: argument.to_owned(),
        };
        let switch = |command: &'static str, argument: &str| match argument {
            "on" => Ok(true),
            "off" => Ok(false),
            other => Err(invalid(command, other)),
        };

        if text.contains("ping") {
            return Ok(DeviceCommand::Ping);
        }
        if let Some(arg) = argument_of(&text, "led-red") {
            let on = switch("led-red", arg)?;
            return Ok(DeviceCommand::SetLed { led: Led::Red, on });
        }
        if let Some(arg) = argument_of(&text, "led-green") {
            let on = switch("led-green", arg)?;
            return Ok(DeviceCommand::SetLed {
                led: Led::Green,
                on,
            });
        }
        if let Some(arg) = argument_of(&text, "led-freq") {
            let hz = arg.parse().map_err(|_| invalid("led-freq", arg))?;
            return Ok(DeviceCommand::LedFrequency(hz));
        }

        Err(CommandError::NotImplemented(text.trim().to_owned()))
    }
}

fn argument_of<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let at = text.find(keyword)?;
    Some(
        text[at + keyword.len()..]
            .split_whitespace()
            .next()
            .unwrap_or_default(),
    )
}

/// The board LEDs
pub trait LedDriver: Send + Sync {
    fn set(&self, led: Led, on: bool) -> io::Result<()>;

    fn set_frequency(&self, hz: u32) -> io::Result<()>;
}

/// Perform `command` on the device
pub fn execute(command: DeviceCommand, leds: &dyn LedDriver) -> io::Result<()> {
    match command {
        DeviceCommand::Ping => {
            info!("ping");
            Ok(())
        }
        DeviceCommand::SetLed { led, on } => leds.set(led, on),
        DeviceCommand::LedFrequency(hz) => leds.set_frequency(hz),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LedState {
    pub red: bool,
    pub green: bool,
    pub frequency: u32,
}

/// LEDs that only exist in the logs
#[derive(Debug, Default)]
pub struct LogLeds {
    state: Mutex<LedState>,
}

impl LogLeds {
    pub fn state(&self) -> LedState {
        self.state.lock().map(|s| *s).unwrap_or_default()
    }
}

impl LedDriver for LogLeds {
    fn set(&self, led: Led, on: bool) -> io::Result<()> {
        info!("{led:?} LED {}", if on { "on" } else { "off" });
        let mut state = self.state.lock().map_err(|_| io::Error::other("LED state poisoned"))?;
        match led {
            Led::Red => state.red = on,
            Led::Green => state.green = on,
        }
        Ok(())
    }

    fn set_frequency(&self, hz: u32) -> io::Result<()> {
        info!("LED frequency {hz}Hz");
        let mut state = self.state.lock().map_err(|_| io::Error::other("LED state poisoned"))?;
        state.frequency = hz;
        Ok(())
    }
}

/// LEDs exposed by the Linux LED class, usually under `/sys/class/leds`
#[derive(Debug, Clone)]
pub struct SysfsLeds {
    root: PathBuf,
    red: String,
    green: String,
}

impl SysfsLeds {
    pub fn new(root: impl Into<PathBuf>, red: impl Into<String>, green: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            red: red.into(),
            green: green.into(),
        }
    }

    fn led_dir(&self, led: Led) -> PathBuf {
        match led {
            Led::Red => self.root.join(&self.red),
            Led::Green => self.root.join(&self.green),
        }
    }

    fn write(dir: &Path, attribute: &str, value: &str) -> io::Result<()> {
        debug!("{}/{attribute} <- {value}", dir.display());
        fs::write(dir.join(attribute), value)
    }
}

impl LedDriver for SysfsLeds {
    fn set(&self, led: Led, on: bool) -> io::Result<()> {
        let dir = self.led_dir(led);
        let brightness = if on {
            fs::read_to_string(dir.join("max_brightness"))
                .map(|max| max.trim().to_owned())
                .unwrap_or_else(|_| "1".to_owned())
        } else {
            "0".to_owned()
        };
        Self::write(&dir, "brightness", &brightness)
    }

    fn set_frequency(&self, hz: u32) -> io::Result<()> {
        let dir = self.led_dir(Led::Green);
        if hz == 0 {
            return Self::write(&dir, "trigger", "none");
        }

        let half_period = (500 / hz).max(1).to_string();
        Self::write(&dir, "trigger", "timer")?;
        Self::write(&dir, "delay_on", &half_period)?;
        Self::write(&dir, "delay_off", &half_period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_parses_vocabulary() {
        assert_eq!(DeviceCommand::parse("ping"), Ok(DeviceCommand::Ping));
        assert_eq!(
            DeviceCommand::parse("led-red on"),
            Ok(DeviceCommand::SetLed {
                led: Led::Red,
                on: true
            })
        );
        assert_eq!(
            DeviceCommand::parse("LED-Green OFF"),
            Ok(DeviceCommand::SetLed {
                led: Led::Green,
                on: false
            })
        );
        assert_eq!(
            DeviceCommand::parse("led-freq 4"),
            Ok(DeviceCommand::LedFrequency(4))
        );
    }

    #[test]
    fn test_keyword_may_appear_anywhere() {
        assert_eq!(DeviceCommand::parse("please ping me"), Ok(DeviceCommand::Ping));
        assert_eq!(
            DeviceCommand::parse("set led-red on now"),
            Ok(DeviceCommand::SetLed {
                led: Led::Red,
                on: true
            })
        );
    }

    #[test]
    fn test_bad_arguments() {
        assert_eq!(
            DeviceCommand::parse("led-red maybe"),
            Err(CommandError::InvalidArgument {
                command: "led-red",
                argument: "maybe".into()
            })
        );
        assert!(matches!(
            DeviceCommand::parse("led-freq"),
            Err(CommandError::InvalidArgument { command: "led-freq", .. })
        ));
        assert!(DeviceCommand::parse("led-freq -1").is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            DeviceCommand::parse("Reboot"),
            Err(CommandError::NotImplemented("reboot".into()))
        );
    }

    #[test]
    fn test_execute_drives_leds() {
        let leds = LogLeds::default();
        execute(DeviceCommand::SetLed { led: Led::Red, on: true }, &leds).unwrap();
        execute(DeviceCommand::LedFrequency(2), &leds).unwrap();
        execute(DeviceCommand::Ping, &leds).unwrap();

        assert_eq!(
            leds.state(),
            LedState {
                red: true,
                green: false,
                frequency: 2
            }
        );
    }

    #[test]
    fn test_sysfs_leds() {
        let root = tempdir().unwrap();
        for name in ["red", "green"] {
            std::fs::create_dir(root.path().join(name)).unwrap();
        }
        std::fs::write(root.path().join("red/max_brightness"), "255\n").unwrap();
        let leds = SysfsLeds::new(root.path(), "red", "green");

        leds.set(Led::Red, true).unwrap();
        leds.set(Led::Green, true).unwrap();
        leds.set_frequency(2).unwrap();

        let read = |path: &str| std::fs::read_to_string(root.path().join(path)).unwrap();
        assert_eq!(read("red/brightness"), "255");
        assert_eq!(read("green/brightness"), "1");
        assert_eq!(read("green/trigger"), "timer");
        assert_eq!(read("green/delay_on"), "250");

        leds.set(Led::Red, false).unwrap();
        assert_eq!(read("red/brightness"), "0");
    }

    #[test]
    fn test_missing_led_is_an_error() {
        let root = tempdir().unwrap();
        let leds = SysfsLeds::new(root.path(), "red", "green");
        assert!(leds.set(Led::Red, true).is_err());
    }
}
