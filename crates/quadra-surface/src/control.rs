//! Control abstraction
//!
//! A control is the logical endpoint a physical encoder or button lands on:
//! it mutates one parameter and carries the activation/visibility flags the
//! paged view model maintains. Drawing is someone else's problem; the
//! foreground color and visibility are just state the widget layer reads.
//!
//! Page slots hold `Option<Rc<RefCell<dyn Control>>>` — an unassigned slot
//! is a first-class value, not an error.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use quadra_core::ParamStore;

/// Foreground color assigned per view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Per-view palette, cycled by view index.
pub const VIEW_PALETTE: [Rgb; 4] = [
    Rgb::new(0xff, 0x40, 0x40),
    Rgb::new(0x40, 0xff, 0x40),
    Rgb::new(0x40, 0x80, 0xff),
    Rgb::new(0xff, 0xc0, 0x40),
];

pub trait Control {
    fn inc(&mut self, fine: bool);
    fn dec(&mut self, fine: bool);
    fn reset(&mut self);

    /// Press/release edges for button controls; encoders ignore these.
    fn on_down(&mut self) {}
    fn on_up(&mut self) {}

    fn set_fg(&mut self, color: Rgb);
    fn set_active(&mut self, active: bool);
    fn set_visible(&mut self, visible: bool);
    fn is_active(&self) -> bool;
    fn is_visible(&self) -> bool;
    fn label(&self) -> &str;
}

pub type ControlRef = Rc<RefCell<dyn Control>>;
pub type Slot = Option<ControlRef>;

/// Wrap a control for a page slot.
pub fn slot(control: impl Control + 'static) -> Slot {
    Some(Rc::new(RefCell::new(control)))
}

/// Slot for an encoder-bound parameter.
pub fn param_slot(params: &Arc<ParamStore>, index: usize) -> Slot {
    slot(ParamControl::new(params.clone(), index))
}

/// A button page of toggles over consecutive parameters; trailing slots
/// beyond `count` stay empty.
pub fn button_slots(
    params: &Arc<ParamStore>,
    base: usize,
    count: usize,
) -> [Slot; crate::pages::BUTTON_SLOTS] {
    let mut slots: [Slot; crate::pages::BUTTON_SLOTS] = Default::default();
    for (i, s) in slots.iter_mut().take(count).enumerate() {
        *s = slot(ToggleButton::new(params.clone(), base + i));
    }
    slots
}

/// Flags and color common to the concrete controls.
#[derive(Debug, Clone, Copy)]
struct WidgetState {
    fg: Rgb,
    active: bool,
    visible: bool,
}

impl Default for WidgetState {
    fn default() -> Self {
        Self {
            fg: VIEW_PALETTE[0],
            active: false,
            visible: false,
        }
    }
}

/// An encoder-bound parameter control.
pub struct ParamControl {
    params: Arc<ParamStore>,
    index: usize,
    label: String,
    state: WidgetState,
}

impl ParamControl {
    pub fn new(params: Arc<ParamStore>, index: usize) -> Self {
        let label = params
            .desc(index)
            .map(|d| d.name.clone())
            .unwrap_or_default();
        Self {
            params,
            index,
            label,
            state: WidgetState::default(),
        }
    }

    pub fn value(&self) -> f32 {
        self.params.get(self.index)
    }
}

impl Control for ParamControl {
    fn inc(&mut self, fine: bool) {
        self.params.inc(self.index, fine);
    }

    fn dec(&mut self, fine: bool) {
        self.params.dec(self.index, fine);
    }

    fn reset(&mut self) {
        self.params.reset(self.index);
    }

    fn set_fg(&mut self, color: Rgb) {
        self.state.fg = color;
    }

    fn set_active(&mut self, active: bool) {
        self.state.active = active;
    }

    fn set_visible(&mut self, visible: bool) {
        self.state.visible = visible;
    }

    fn is_active(&self) -> bool {
        self.state.active
    }

    fn is_visible(&self) -> bool {
        self.state.visible
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// A button that flips its parameter between 0 and 1 on the press edge.
pub struct ToggleButton {
    params: Arc<ParamStore>,
    index: usize,
    label: String,
    state: WidgetState,
}

impl ToggleButton {
    pub fn new(params: Arc<ParamStore>, index: usize) -> Self {
        let label = params
            .desc(index)
            .map(|d| d.name.clone())
            .unwrap_or_default();
        Self {
            params,
            index,
            label,
            state: WidgetState::default(),
        }
    }

    pub fn is_on(&self) -> bool {
        self.params.get_bool(self.index)
    }
}

impl Control for ToggleButton {
    fn inc(&mut self, _fine: bool) {
        self.params.set(self.index, 1.0);
    }

    fn dec(&mut self, _fine: bool) {
        self.params.set(self.index, 0.0);
    }

    fn reset(&mut self) {
        self.params.reset(self.index);
    }

    fn on_down(&mut self) {
        let on = self.params.get_bool(self.index);
        self.params.set(self.index, if on { 0.0 } else { 1.0 });
    }

    fn set_fg(&mut self, color: Rgb) {
        self.state.fg = color;
    }

    fn set_active(&mut self, active: bool) {
        self.state.active = active;
    }

    fn set_visible(&mut self, visible: bool) {
        self.state.visible = visible;
    }

    fn is_active(&self) -> bool {
        self.state.active
    }

    fn is_visible(&self) -> bool {
        self.state.visible
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// A button that holds its parameter at 1 while pressed.
pub struct MomentaryButton {
    params: Arc<ParamStore>,
    index: usize,
    label: String,
    state: WidgetState,
}

impl MomentaryButton {
    pub fn new(params: Arc<ParamStore>, index: usize) -> Self {
        let label = params
            .desc(index)
            .map(|d| d.name.clone())
            .unwrap_or_default();
        Self {
            params,
            index,
            label,
            state: WidgetState::default(),
        }
    }
}

impl Control for MomentaryButton {
    fn inc(&mut self, _fine: bool) {
        self.params.set(self.index, 1.0);
    }

    fn dec(&mut self, _fine: bool) {
        self.params.set(self.index, 0.0);
    }

    fn reset(&mut self) {
        self.params.reset(self.index);
    }

    fn on_down(&mut self) {
        self.params.set(self.index, 1.0);
    }

    fn on_up(&mut self) {
        self.params.set(self.index, 0.0);
    }

    fn set_fg(&mut self, color: Rgb) {
        self.state.fg = color;
    }

    fn set_active(&mut self, active: bool) {
        self.state.active = active;
    }

    fn set_visible(&mut self, visible: bool) {
        self.state.visible = visible;
    }

    fn is_active(&self) -> bool {
        self.state.active
    }

    fn is_visible(&self) -> bool {
        self.state.visible
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadra_core::ParamDesc;

    fn store() -> Arc<ParamStore> {
        Arc::new(ParamStore::new(vec![
            ParamDesc::new("freq", "Freq", 0.0, 1.0, 0.5),
            ParamDesc::toggle("mute", "Mute"),
        ]))
    }

    #[test]
    fn test_param_control_steps_and_reset() {
        let params = store();
        let mut c = ParamControl::new(params.clone(), 0);
        c.inc(false);
        assert!(c.value() > 0.5);
        c.reset();
        assert_eq!(c.value(), 0.5);
        assert_eq!(c.label(), "Freq");
    }

    #[test]
    fn test_toggle_button_flips_on_press() {
        let params = store();
        let mut b = ToggleButton::new(params, 1);
        b.on_down();
        assert!(b.is_on());
        b.on_up();
        assert!(b.is_on());
        b.on_down();
        assert!(!b.is_on());
    }

    #[test]
    fn test_momentary_button_tracks_hold() {
        let params = store();
        let mut b = MomentaryButton::new(params.clone(), 1);
        b.on_down();
        assert!(params.get_bool(1));
        b.on_up();
        assert!(!params.get_bool(1));
    }
}
