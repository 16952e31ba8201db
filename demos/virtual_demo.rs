use input43d::backends::virtual_input::{VirtualGameController, VirtualKeyboard, VirtualMouse};
use input43d::{
    AxisPosition, ControllerLayout, Device, EventLogger, GameController, InputConfig, Keyboard,
    Mouse, MouseListener, NpKey,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Prints clicks only; everything else goes through the logger.
struct ClickPrinter;

impl MouseListener for ClickPrinter {
    fn button_clicked(&mut self, source: &dyn Mouse, button: u16, click_count: u16) {
        println!("{}: button {button} clicked x{click_count}", source.name());
    }
}

fn main() -> input43d::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = InputConfig {
        client_width: 640,
        client_height: 480,
        ..InputConfig::default()
    };

    let logger = Rc::new(RefCell::new(EventLogger::new()));
    let clicks = Rc::new(RefCell::new(ClickPrinter));

    let mut keyboard = VirtualKeyboard::from_config("virtual:demo:kb", "Demo Keyboard", &config)?;
    let mut mouse = VirtualMouse::new("virtual:demo:mouse", "Demo Mouse", &config);
    let mut pad = VirtualGameController::new(
        "virtual:demo:pad",
        "Demo Gamepad",
        ControllerLayout::gamepad(),
        &config,
    );

    keyboard.add_listener(logger.clone());
    mouse.add_listener(logger.clone());
    mouse.add_listener(clicks.clone());
    pad.add_listener(logger.clone());

    // 'a' down, typed, up; then Enter.
    keyboard.feed_scan_code(0x1E);
    keyboard.feed_char('a');
    keyboard.feed_scan_code(0x9E);
    keyboard.tap_npk(NpKey::Enter)?;

    mouse.feed_move(100, 120);
    mouse.feed_button(1, true)?;
    mouse.feed_button(1, false)?;
    mouse.feed_button(1, true)?;
    mouse.feed_button(1, false)?;
    mouse.feed_wheel(0, -240);
    mouse.feed_move(700, 120);

    pad.set_axis(0, AxisPosition::new(16000, -8000, 0))?;
    pad.set_button(0, true)?;
    pad.disconnect();

    println!("logger saw {} events", logger.borrow().received());
    Ok(())
}
