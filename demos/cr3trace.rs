use std::{
    process::ExitCode,
    sync::{Arc, atomic::AtomicBool},
};

use cr3watch::{Cr3Event, DomainDirectory, MonitorSession, xen::Xen};

fn parse_args() -> Option<String> {
    let mut args = std::env::args().skip(1);
    let mut uuid = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--uuid" => uuid = Some(args.next()?),
            _ => return None,
        }
    }

    uuid.filter(|uuid| !uuid.is_empty())
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let Some(uuid) = parse_args()
    else {
        eprintln!("usage: cr3trace --uuid <uuid>");
        return Ok(ExitCode::from(2));
    };

    let terminate_flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, terminate_flag.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, terminate_flag.clone())?;

    let xen = Xen::new();
    let domain_id = DomainDirectory::new(&xen).find_by_uuid(&uuid)?;
    println!("attach uuid={uuid} domid={domain_id}");

    let mut session = MonitorSession::open(&xen, domain_id, Some(&uuid))?;
    session.enable()?;

    println!("monitor started (Ctrl+C to stop)");

    let mut on_cr3 = |event: &Cr3Event<'_>| {
        println!(
            "domid={} uuid={} vcpu={} old={:#x} new={:#x} rip={:#x}",
            event.domain_id(),
            event.uuid().unwrap_or_default(),
            event.vcpu_id(),
            event.old_value(),
            event.new_value(),
            event.rip(),
        );
    };

    let result = session.run(&mut on_cr3, &terminate_flag);
    if let Err(err) = &result {
        tracing::error!(%err, "monitor loop failed");
    }

    let stats = session.stats();
    tracing::info!(
        wakeups = stats.wakeups,
        requests = stats.requests,
        cr3_events = stats.cr3_events,
        overhead = ?stats.processing_overhead,
        "monitor stopped"
    );

    session.close();
    println!("done");

    Ok(match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    })
}
