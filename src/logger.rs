use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;
use std::sync::Once;
use std::sync::OnceLock;

static INIT: Once = Once::new();

/// (rank, size) of the process that owns this logger
static TOPOLOGY: OnceLock<(usize, usize)> = OnceLock::new();

pub fn init(rank: usize, size: usize) {
    INIT.call_once(|| {
        // first caller wins, later calls are no-ops
        let _ = TOPOLOGY.set((rank, size));

        Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format(|buf, record| {
                let (rank, size) = TOPOLOGY.get().copied().unwrap_or((0, 1));
                writeln!(
                    buf,
                    "[RANK {}/{}] {} - {}: {}",
                    rank,
                    size,
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .init();
    });
}

pub fn set_log_level(level: LevelFilter) {
    log::set_max_level(level);
}
