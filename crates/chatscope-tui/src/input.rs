use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use chatscope_core::viz::Direction;

use crate::app::{App, InputMode};

const PAN_STEP: f32 = 0.2;
const ZOOM_IN: f32 = 0.8;
const ZOOM_OUT: f32 = 1.25;

pub(crate) fn handle_key(app: &mut App, key: KeyEvent) {
    match app.mode {
        InputMode::Normal => handle_normal_key(app, key),
        InputMode::Search => handle_search_key(app, key),
        InputMode::Filters => handle_filter_key(app, key),
    }
}

fn handle_normal_key(app: &mut App, key: KeyEvent) {
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('/') => app.mode = InputMode::Search,
        KeyCode::Char('f') => app.mode = InputMode::Filters,
        KeyCode::Left if shift => app.pan(-PAN_STEP, 0.0),
        KeyCode::Right if shift => app.pan(PAN_STEP, 0.0),
        KeyCode::Up if shift => app.pan(0.0, PAN_STEP),
        KeyCode::Down if shift => app.pan(0.0, -PAN_STEP),
        KeyCode::Left | KeyCode::Char('h') => app.navigate(Direction::Previous),
        KeyCode::Right | KeyCode::Char('l') => app.navigate(Direction::Next),
        KeyCode::Char('+') | KeyCode::Char('=') => app.zoom(ZOOM_IN),
        KeyCode::Char('-') => app.zoom(ZOOM_OUT),
        KeyCode::Char('0') => app.home_camera(),
        KeyCode::Char('m') => app.toggle_multi_select(),
        KeyCode::Char('z') => app.focus_matches(),
        KeyCode::Char('t') => app.toggle_theme(),
        KeyCode::Char('r') => app.start_load(false),
        KeyCode::Char('R') => app.start_load(true),
        KeyCode::Esc => app.reset_view(),
        _ => {}
    }
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.mode = InputMode::Normal,
        KeyCode::Enter => {
            app.mode = InputMode::Normal;
            app.start_search();
        }
        KeyCode::Backspace => {
            app.term.pop();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => app.term.clear(),
        KeyCode::Char(c) => app.term.push(c),
        _ => {}
    }
}

fn handle_filter_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.mode = InputMode::Normal,
        KeyCode::Enter => {
            app.mode = InputMode::Normal;
            app.start_search();
        }
        KeyCode::Tab | KeyCode::Down => app.filters.focus_next(),
        KeyCode::BackTab | KeyCode::Up => app.filters.focus_prev(),
        KeyCode::Backspace => {
            app.filters.focused_mut().pop();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => app.filters.focused_mut().clear(),
        KeyCode::Char('x') if key.modifiers.contains(KeyModifiers::CONTROL) => app.filters.clear(),
        KeyCode::Char(c) => app.filters.focused_mut().push(c),
        _ => {}
    }
}

pub(crate) fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.mode != InputMode::Normal {
        return;
    }
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            // Shift-click adds to the selection without toggling the mode
            let additive = mouse.modifiers.contains(KeyModifiers::SHIFT);
            app.begin_drag(mouse.column, mouse.row, additive);
        }
        MouseEventKind::Drag(MouseButton::Left) => app.extend_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.end_drag(mouse.column, mouse.row),
        MouseEventKind::Moved => {
            let hovered = app.point_under(mouse.column, mouse.row);
            app.viz.hover(hovered);
        }
        MouseEventKind::ScrollUp => app.zoom(ZOOM_IN),
        MouseEventKind::ScrollDown => app.zoom(ZOOM_OUT),
        _ => {}
    }
}
