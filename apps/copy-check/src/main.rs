//! Fill a source buffer, run one polling transfer, verify the
//! destination byte-for-byte. Runs against the simulated engine, so it
//! doubles as a smoke test for the whole driver path on a host.

use std::process::ExitCode;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use axi_cdma::sim::SimDma;
use axi_cdma::{AxiCdma, CacheOp, Config, DeviceInfo, Hal};
use log::{error, info};

const LEN: usize = 64;

struct HostHal;

impl Hal for HostHal {
    fn dcache_range(_op: CacheOp, _addr: usize, _size: usize) {
        // The host is cache-coherent with the simulated engine.
    }

    fn since_boot() -> Duration {
        static BOOT: OnceLock<Instant> = OnceLock::new();
        BOOT.get_or_init(Instant::now).elapsed()
    }
}

#[repr(align(64))]
struct Buf([u8; LEN]);

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let src = Buf(core::array::from_fn(|i| i as u8));
    let mut dst = Buf([0u8; LEN]);

    let sim = SimDma::new();
    let info = DeviceInfo {
        device_id: 0,
        base_addr: 0x4400_0000,
        addr_width: 64,
        data_width: 32,
        has_dre: false,
        burst_len: 16,
    };
    let mut dma: AxiCdma<_, HostHal> = AxiCdma::new(sim, &info, Config::default());

    if let Err(e) = dma.transfer_blocking(src.0.as_ptr() as u64, dst.0.as_mut_ptr() as u64, LEN as _)
    {
        error!("transfer failed: {e}");
        return ExitCode::FAILURE;
    }

    let errors = src.0.iter().zip(dst.0.iter()).filter(|(a, b)| a != b).count();
    if errors != 0 {
        error!("{errors} byte(s) differ at the destination");
        return ExitCode::FAILURE;
    }

    info!("transfer successful, {LEN} bytes verified");
    ExitCode::SUCCESS
}
