//! Composite editor for the sequencer plugins
//!
//! Sequencers spread one surface over layers × encoder modes: every layer
//! has a CV view and a function view, mapped onto the paged editor as
//! `layer + mode * n_layers`. Left/Right move between layers. Right-Shift
//! flips the encoder mode. Left-Shift flips the button-page group (steps'
//! gate/access pages vs their glide pages): the current page jumps by the
//! group stride, keeping its offset, and Up/Down are confined to the new
//! group's page range until the next toggle.

use crate::dispatch::{Dispatcher, NavKey};
use crate::pages::PagedEditor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderMode {
    Cv,
    Function,
}

pub struct SequencerEditor {
    editor: PagedEditor,
    dispatcher: Dispatcher,
    n_layers: usize,
    layer: usize,
    mode: EncoderMode,
    /// Second button-page group selected (glide pages)
    glide: bool,
    /// Button pages per group
    group_stride: usize,
}

impl SequencerEditor {
    pub fn new(n_layers: usize, group_stride: usize) -> Self {
        assert!(n_layers > 0 && group_stride > 0);
        Self {
            editor: PagedEditor::new(n_layers * 2),
            dispatcher: Dispatcher::new(),
            n_layers,
            layer: 0,
            mode: EncoderMode::Cv,
            glide: false,
            group_stride,
        }
    }

    /// View index for a layer/mode pair, for page registration.
    pub fn view_index(&self, layer: usize, mode: EncoderMode) -> usize {
        let mode = match mode {
            EncoderMode::Cv => 0,
            EncoderMode::Function => 1,
        };
        layer + mode * self.n_layers
    }

    pub fn editor_mut(&mut self) -> &mut PagedEditor {
        &mut self.editor
    }

    pub fn layer(&self) -> usize {
        self.layer
    }

    pub fn mode(&self) -> EncoderMode {
        self.mode
    }

    /// First and one-past-last button page reachable in the current group.
    fn group_range(&self) -> (usize, usize) {
        let floor = if self.glide { self.group_stride } else { 0 };
        (floor, floor + self.group_stride)
    }

    pub fn on_encoder(&mut self, encoder: usize, delta: f32) {
        self.dispatcher.on_encoder(&self.editor, encoder, delta);
    }

    pub fn on_encoder_switch(&mut self, encoder: usize, pressed: bool) {
        self.dispatcher
            .on_encoder_switch(&self.editor, encoder, pressed);
    }

    pub fn on_button(&mut self, button: usize, pressed: bool) {
        self.dispatcher.on_button(&self.editor, button, pressed);
    }

    /// Up/Down move the button page inside the current group; Left/Right
    /// move between layers. Release edge only.
    pub fn on_nav(&mut self, key: NavKey, pressed: bool) {
        if pressed {
            return;
        }
        match key {
            NavKey::Up => self.chg_button_page(-1),
            NavKey::Down => self.chg_button_page(1),
            NavKey::Left => self.chg_layer(-1),
            NavKey::Right => self.chg_layer(1),
        }
    }

    /// Left-Shift release: flip the button-page group, jumping the current
    /// page by the stride so the step offset is preserved.
    pub fn on_left_shift(&mut self, pressed: bool) {
        if pressed {
            return;
        }
        let (old_floor, _) = self.group_range();
        self.glide = !self.glide;
        let (new_floor, _) = self.group_range();
        let page = self.editor.button_page() + new_floor - old_floor;
        self.editor.set_button_page(page, true);
    }

    /// Right-Shift release: flip between CV and function encoder views.
    pub fn on_right_shift(&mut self, pressed: bool) {
        if pressed {
            return;
        }
        self.mode = match self.mode {
            EncoderMode::Cv => EncoderMode::Function,
            EncoderMode::Function => EncoderMode::Cv,
        };
        self.editor.set_view(self.view_index(self.layer, self.mode));
    }

    fn chg_layer(&mut self, delta: i32) {
        let target = (self.layer as i32 + delta).clamp(0, self.n_layers as i32 - 1);
        self.layer = target as usize;
        self.editor.set_view(self.view_index(self.layer, self.mode));
    }

    fn chg_button_page(&mut self, delta: i32) {
        let (floor, ceil) = self.group_range();
        let target = (self.editor.button_page() as i32 + delta)
            .clamp(floor as i32, ceil as i32 - 1);
        self.editor.set_button_page(target as usize, true);
    }
}
