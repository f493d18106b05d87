use std::sync::Arc;

use sevlog::{LazyFormat, Loggers, Severity, single_line};

fn main() {
    let loggers = Loggers::new();
    loggers.log.configure_sink("stdout");
    loggers.usage.configure_sink("print");
    loggers.usage.set_level(Severity::Notice);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let log = Arc::clone(&loggers.log);
            std::thread::spawn(move || {
                log.debug(
                    &format!("client {i}"),
                    LazyFormat::new(
                        "request ",
                        single_line,
                        "GET / HTTP/1.1\r\nHost: example.net\r\n",
                    ),
                );
                log.warning(&format!("client {i}"), "upstream slow");
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // an operator asks for everything
    loggers.log.toggle();
    loggers.log.debug("client 0", "now visible");
    loggers.log.toggle();
    loggers.log.debug("client 0", "hidden again");

    loggers.usage.notice("usage", "4 clients served");

    println!("\n--- History ---\n{}", loggers.log.history());
}
