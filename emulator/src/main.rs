mod host;
mod mixer;
mod terminal;

use std::env;
use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use dial_core::link::{DEFAULT_DESTINATION_OCTET, LinkConfig, MIXER_PORT};
use dial_core::power::PowerPolicyConfig;
use volume_dial_firmware::clock::FirmwareInstant;
use volume_dial_firmware::hw::wait_until_present;
use volume_dial_firmware::network::NetworkContext;
use volume_dial_firmware::power::{PowerContext, PowerStep};
use volume_dial_firmware::render::{RenderCadence, RenderContext};
use volume_dial_firmware::{SharedState, load_settings};

use host::{
    FileStore, HostPanel, HostSleep, HostSocket, PanelBacklight, PanelDisplay, PanelKnob,
    PanelTouch, SimulatedGauge,
};
use mixer::{Handled, MockMixer, TELEMETRY_PERIOD};
use terminal::Action;

static SHARED: SharedState = SharedState::new();

const USAGE: &str = "Usage: dial-emulator [--settings <path>] [--mixer-octet <1-254>] [--no-mixer]";
const NETWORK_IDLE_DELAY: Duration = Duration::from_millis(2);
const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

struct Options {
    settings_path: PathBuf,
    mixer_octet: u8,
    serve_mixer: bool,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let panel = Arc::new(HostPanel::new());
    let mut store = FileStore::open(options.settings_path)?;
    let settings = load_settings(&mut store);
    let boot = FirmwareInstant::now();

    if options.serve_mixer {
        let socket = UdpSocket::bind(SocketAddrV4::new(
            Ipv4Addr::new(127, 0, 0, options.mixer_octet),
            MIXER_PORT,
        ))?;
        thread::spawn(move || {
            if let Err(err) = serve_mixer(&socket) {
                eprintln!("mixer: stopped: {err}");
            }
        });
    }

    let mut gauge = SimulatedGauge::new(Arc::clone(&panel), 75.0);
    wait_until_present(&mut gauge, "fuel gauge", thread::sleep);

    let socket = HostSocket::bind(Ipv4Addr::LOCALHOST, Arc::clone(&panel))?;
    let mut network = NetworkContext::new(socket, store, settings, LinkConfig::DEFAULT);
    let mut power = PowerContext::new(
        gauge,
        PanelBacklight(Arc::clone(&panel)),
        HostSleep(Arc::clone(&panel)),
        PowerPolicyConfig::DEFAULT,
        boot,
    );
    thread::spawn(move || {
        loop {
            let now = FirmwareInstant::now();
            let activity = network.poll(&SHARED, now);
            if let PowerStep::Slept(_) = power.poll(network.monitor(), &SHARED, now) {
                power.resume(&SHARED, FirmwareInstant::now());
            }
            if activity.is_idle() {
                thread::sleep(NETWORK_IDLE_DELAY);
            }
        }
    });

    let mut render = RenderContext::new(
        PanelTouch(Arc::clone(&panel)),
        PanelKnob(Arc::clone(&panel)),
        PanelDisplay(Arc::clone(&panel)),
        settings,
        RenderCadence::DEFAULT,
        boot,
    );
    let rendering = Arc::new(AtomicBool::new(true));
    let render_flag = Arc::clone(&rendering);
    thread::spawn(move || {
        while render_flag.load(Ordering::Relaxed) {
            let delay = render.poll(&SHARED, FirmwareInstant::now());
            thread::sleep(delay);
        }
    });

    enable_raw_mode()?;
    let outcome = run_terminal(&panel);
    disable_raw_mode()?;
    rendering.store(false, Ordering::Relaxed);
    outcome
}

fn run_terminal(panel: &HostPanel) -> io::Result<()> {
    let mut stdout = io::stdout();
    loop {
        let status = format!(
            "backlight {:>3} | cable {} | radio {} | {}",
            panel.backlight(),
            if panel.charging() { "in" } else { "out" },
            if panel.radio_on() { "on" } else { "off" },
            if panel.asleep() { "asleep" } else { "awake" },
        );
        terminal::draw(&mut stdout, &panel.frame_text(), &status)?;

        if !event::poll(REDRAW_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match terminal::key_action(key) {
            Some(Action::Quit) => return Ok(()),
            // The panel is unpowered while asleep.
            Some(Action::Touch(touch)) if !panel.asleep() => panel.push_touch(touch),
            Some(Action::Turn(degrees)) => {
                panel.turn_knob(degrees);
                if panel.asleep() {
                    panel.wake();
                }
            }
            Some(Action::ToggleCharging) => panel.toggle_charging(),
            Some(Action::Wake) => panel.wake(),
            Some(Action::Touch(_)) | None => {}
        }
    }
}

/// Runs the loopback mixer until its socket fails.
fn serve_mixer(socket: &UdpSocket) -> io::Result<()> {
    socket.set_read_timeout(Some(TELEMETRY_PERIOD))?;
    let mut mixer = MockMixer::new();
    let mut buf = [0u8; 1_500];
    let mut next_frame = Instant::now();

    loop {
        match socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                let now = Instant::now();
                let subscribed = mixer.has_subscriber(now);
                match mixer.handle_datagram(&buf[..len], from, now) {
                    Handled::Registered { ttl } if !subscribed => {
                        eprintln!("mixer: {from} subscribed for {}s", ttl.as_secs());
                    }
                    _ => {}
                }
            }
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(err) => return Err(err),
        }

        let now = Instant::now();
        if now < next_frame {
            continue;
        }
        next_frame = now + TELEMETRY_PERIOD;
        if let Some((destination, frame)) = mixer.next_frame(now) {
            socket.send_to(&frame, destination)?;
        }
    }
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        settings_path: env::temp_dir().join("dial-emulator-settings.txt"),
        mixer_octet: DEFAULT_DESTINATION_OCTET,
        serve_mixer: true,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => {
                let path = args.next().ok_or("Expected value after --settings")?;
                options.settings_path = PathBuf::from(path);
            }
            "--mixer-octet" => {
                let value = args.next().ok_or("Expected value after --mixer-octet")?;
                options.mixer_octet = dial_core::commands::parse_destination_octet(&value)
                    .ok_or_else(|| format!("Invalid mixer octet `{value}`"))?;
            }
            "--no-mixer" => options.serve_mixer = false,
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }
    Ok(options)
}
