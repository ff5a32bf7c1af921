use std::{sync::Arc, thread};

use signal_hook::{consts::SIGQUIT, iterator::Signals};

use super::Logger;
use crate::{
    display::{CharDisplay, SharedDisplay},
    poll::ShutdownToken,
    render, Error, Result,
};

/// Route SIGHUP/SIGINT/SIGQUIT/SIGTERM to a handler that flags the stop,
/// shows the shutdown message and exits with status 0 without waiting for
/// the loop.
///
/// `ctrlc` owns SIGINT, SIGTERM and SIGHUP; SIGQUIT is picked up by a
/// dedicated thread and runs the same shutdown path.
pub(super) fn install_shutdown_handler<D>(
    display: SharedDisplay<D>,
    shutdown: ShutdownToken,
    logger: Arc<Logger>,
) -> Result<()>
where
    D: CharDisplay + Send + 'static,
{
    let mut quit_signals = Signals::new([SIGQUIT])?;
    {
        let display = display.clone();
        let shutdown = shutdown.clone();
        let logger = Arc::clone(&logger);
        thread::Builder::new()
            .name("sigquit".into())
            .spawn(move || {
                if quit_signals.forever().next().is_some() {
                    shut_down(display, &shutdown, &logger);
                }
            })?;
    }

    ctrlc::set_handler(move || shut_down(display.clone(), &shutdown, &logger))
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}

fn shut_down<D: CharDisplay>(
    mut display: SharedDisplay<D>,
    shutdown: &ShutdownToken,
    logger: &Logger,
) -> ! {
    logger.warn("termination signal received; exiting");
    shutdown.request_stop();
    if let Err(err) = render::render_shutdown(&mut display) {
        logger.error(format!("shutdown message: {err}"));
    }
    std::process::exit(0);
}
