use std::thread;

use slot_limit::Blocking;

fn main() -> Result<(), slot_limit::LimitError> {
    let limiter = Blocking::new(16)?;
    let total = 1024;

    thread::scope(|s| {
        for i in 0..total {
            let limiter = &limiter;
            s.spawn(move || {
                limiter.run(|| println!("{i}"));
            });
        }
    });

    Ok(())
}
