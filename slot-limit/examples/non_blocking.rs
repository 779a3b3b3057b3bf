use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;

use slot_limit::NonBlocking;

fn main() -> Result<(), slot_limit::LimitError> {
    let limiter = NonBlocking::new(16)?;
    let total = 1024;
    let over = AtomicUsize::new(0);

    thread::scope(|s| {
        for i in 0..total {
            let limiter = &limiter;
            let over = &over;
            s.spawn(move || {
                limiter.run(
                    || println!("under {i}"),
                    || {
                        over.fetch_add(1, Ordering::Relaxed);
                        println!("over {i}");
                    },
                );
            });
        }
    });

    println!(
        "{} of {total} calls found the limiter full",
        over.load(Ordering::Relaxed)
    );
    Ok(())
}
