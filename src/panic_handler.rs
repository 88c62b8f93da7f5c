use std::panic;
use std::thread;

pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Render workers catch their own panics and report a failed task.
        let current = thread::current();
        if current.name() != Some("main") {
            log::warn!("Panic on thread {:?}: {panic_info}", current.name());
            return;
        }

        log::error!("Fatal panic: {panic_info}");
        log::logger().flush();

        default_hook(panic_info);

        std::process::exit(1);
    }));
}
