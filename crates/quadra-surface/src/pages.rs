//! Paged view model
//!
//! Views hold ordered param pages (4 encoder slots) and button pages
//! (8 button slots). Exactly one param page and one button page is current,
//! and only the current view's current pages have visible controls; the
//! current param page's controls are also the active ones. Button slots are
//! addressed purely by the current page index and carry no activation of
//! their own. Breaking the single-current-page rule would bind one physical
//! encoder to two parameters at once.
//!
//! Page indices are shared across views: switching view keeps the page
//! position, which requires every view to carry enough pages — a structural
//! property of editor construction, asserted rather than handled.

use crate::control::{ControlRef, Rgb, Slot, VIEW_PALETTE};

/// Encoder slots per param page.
pub const PARAM_SLOTS: usize = 4;
/// Button slots per button page.
pub const BUTTON_SLOTS: usize = 8;

struct View {
    color: Rgb,
    param_pages: Vec<[Slot; PARAM_SLOTS]>,
    button_pages: Vec<[Slot; BUTTON_SLOTS]>,
}

fn show_slots(slots: &[Slot], visible: bool, active: bool) {
    for slot in slots.iter().flatten() {
        let mut c = slot.borrow_mut();
        c.set_visible(visible);
        c.set_active(active);
    }
}

fn show_buttons(slots: &[Slot], visible: bool) {
    for slot in slots.iter().flatten() {
        slot.borrow_mut().set_visible(visible);
    }
}

pub struct PagedEditor {
    views: Vec<View>,
    view: usize,
    param_page: usize,
    button_page: usize,
}

impl PagedEditor {
    pub fn new(n_views: usize) -> Self {
        assert!(n_views > 0, "an editor needs at least one view");
        let views = (0..n_views)
            .map(|v| View {
                color: VIEW_PALETTE[v % VIEW_PALETTE.len()],
                param_pages: Vec::new(),
                button_pages: Vec::new(),
            })
            .collect();
        Self {
            views,
            view: 0,
            param_page: 0,
            button_page: 0,
        }
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    pub fn view(&self) -> usize {
        self.view
    }

    pub fn param_page(&self) -> usize {
        self.param_page
    }

    pub fn button_page(&self) -> usize {
        self.button_page
    }

    pub fn num_param_pages(&self) -> usize {
        self.views[self.view].param_pages.len()
    }

    pub fn num_button_pages(&self) -> usize {
        self.views[self.view].button_pages.len()
    }

    /// Register a page of encoder controls at the end of `view`'s sequence.
    /// Non-null controls take the view's color. The first page of the
    /// displayed view shows immediately; everything else starts hidden.
    pub fn add_param_page(&mut self, slots: [Slot; PARAM_SLOTS], view: usize) -> usize {
        assert!(view < self.views.len(), "param page added to missing view");
        let color = self.views[view].color;
        for slot in slots.iter().flatten() {
            slot.borrow_mut().set_fg(color);
        }
        let index = self.views[view].param_pages.len();
        let live = view == self.view && index == self.param_page;
        show_slots(&slots, live, live);
        self.views[view].param_pages.push(slots);
        index
    }

    /// Same for a page of button controls.
    pub fn add_button_page(&mut self, slots: [Slot; BUTTON_SLOTS], view: usize) -> usize {
        assert!(view < self.views.len(), "button page added to missing view");
        let color = self.views[view].color;
        for slot in slots.iter().flatten() {
            slot.borrow_mut().set_fg(color);
        }
        let index = self.views[view].button_pages.len();
        let live = view == self.view && index == self.button_page;
        show_buttons(&slots, live);
        self.views[view].button_pages.push(slots);
        index
    }

    /// Switch the current param page. With `propagate_visibility` false only
    /// the activation flags move; the caller is about to handle visibility
    /// through a view switch.
    pub fn set_param_page(&mut self, index: usize, propagate_visibility: bool) {
        if index == self.param_page || index >= self.num_param_pages() {
            return;
        }
        let view = &self.views[self.view];
        for slot in view.param_pages[self.param_page].iter().flatten() {
            let mut c = slot.borrow_mut();
            c.set_active(false);
            if propagate_visibility {
                c.set_visible(false);
            }
        }
        for slot in view.param_pages[index].iter().flatten() {
            let mut c = slot.borrow_mut();
            c.set_active(true);
            if propagate_visibility {
                c.set_visible(true);
            }
        }
        self.param_page = index;
    }

    /// Move the param page by `delta`, clamped at the ends.
    pub fn chg_param_page(&mut self, delta: i32) {
        let count = self.num_param_pages();
        if count == 0 {
            return;
        }
        let target = (self.param_page as i32 + delta).clamp(0, count as i32 - 1);
        self.set_param_page(target as usize, true);
    }

    /// Switch the current button page. Button slots are reached through the
    /// page index alone, so only visibility moves.
    pub fn set_button_page(&mut self, index: usize, propagate_visibility: bool) {
        if index == self.button_page || index >= self.num_button_pages() {
            return;
        }
        if propagate_visibility {
            let view = &self.views[self.view];
            show_buttons(&view.button_pages[self.button_page], false);
            show_buttons(&view.button_pages[index], true);
        }
        self.button_page = index;
    }

    pub fn chg_button_page(&mut self, delta: i32) {
        let count = self.num_button_pages();
        if count == 0 {
            return;
        }
        let target = (self.button_page as i32 + delta).clamp(0, count as i32 - 1);
        self.set_button_page(target as usize, true);
    }

    /// Switch views, keeping the shared page indices. Every view must have
    /// pages at those indices; a view built too small is a construction
    /// defect.
    pub fn set_view(&mut self, view: usize) {
        if view == self.view || view >= self.views.len() {
            return;
        }
        assert!(
            self.param_page < self.views[view].param_pages.len()
                || self.views[view].param_pages.is_empty(),
            "view {view} has no param page {}",
            self.param_page
        );
        assert!(
            self.button_page < self.views[view].button_pages.len()
                || self.views[view].button_pages.is_empty(),
            "view {view} has no button page {}",
            self.button_page
        );

        let old = &self.views[self.view];
        if let Some(page) = old.param_pages.get(self.param_page) {
            show_slots(page, false, false);
        }
        if let Some(page) = old.button_pages.get(self.button_page) {
            show_buttons(page, false);
        }

        self.view = view;

        let new = &self.views[self.view];
        if let Some(page) = new.param_pages.get(self.param_page) {
            show_slots(page, true, true);
        }
        if let Some(page) = new.button_pages.get(self.button_page) {
            show_buttons(page, true);
        }
    }

    pub fn chg_view(&mut self, delta: i32) {
        let target = (self.view as i32 + delta).clamp(0, self.views.len() as i32 - 1);
        self.set_view(target as usize);
    }

    /// The control a given encoder is currently bound to, if any.
    pub fn active_param_slot(&self, encoder: usize) -> Option<ControlRef> {
        self.views[self.view]
            .param_pages
            .get(self.param_page)?
            .get(encoder)?
            .clone()
    }

    /// The control a given button is currently bound to, if any.
    pub fn active_button_slot(&self, button: usize) -> Option<ControlRef> {
        self.views[self.view]
            .button_pages
            .get(self.button_page)?
            .get(button)?
            .clone()
    }

    /// Count live controls across every view (param: active and visible,
    /// button: visible), for invariant checks.
    #[cfg(test)]
    fn count_live(&self) -> (usize, usize) {
        let mut param = 0;
        let mut button = 0;
        for view in &self.views {
            for page in &view.param_pages {
                for slot in page.iter().flatten() {
                    let c = slot.borrow();
                    if c.is_active() && c.is_visible() {
                        param += 1;
                    }
                }
            }
            for page in &view.button_pages {
                for slot in page.iter().flatten() {
                    if slot.borrow().is_visible() {
                        button += 1;
                    }
                }
            }
        }
        (param, button)
    }
}
