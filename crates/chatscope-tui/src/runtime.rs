use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::app::{App, AppEvent};
use crate::input::{handle_key, handle_mouse};
use crate::render::render;
use crate::terminal::Tui;

pub(crate) async fn run_app(terminal: &mut Tui, app: &mut App, mut events_rx: UnboundedReceiver<AppEvent>) -> Result<()> {
    let mut event_stream = EventStream::new();

    // Cooperative timer: each tick processes at most one transform batch
    let mut tick_interval = tokio::time::interval(app.viz.config().batch_delay.max(std::time::Duration::from_millis(16)));

    app.start_load(false);

    while app.running {
        terminal.draw(|f| render(f, app))?;

        tokio::select! {
            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                            if app.pending_quit {
                                app.quit();
                            } else {
                                app.pending_quit = true;
                            }
                        } else {
                            app.pending_quit = false;
                            handle_key(app, key);
                        }
                    }
                    Some(Ok(Event::Mouse(mouse))) => handle_mouse(app, mouse),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => debug!(error = %e, "terminal event error"),
                    None => app.quit(),
                }
            }

            Some(event) = events_rx.recv() => {
                app.handle_event(event);
            }

            _ = tick_interval.tick() => {
                app.tick();
            }
        }
    }

    Ok(())
}
