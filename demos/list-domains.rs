use cr3watch::{DomainDirectory, xen::Xen};

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let xen = Xen::new();
    let domains = DomainDirectory::new(&xen).snapshot()?;

    println!("count={}", domains.len());
    for domain in &domains {
        println!(
            "domid={} hvm={} dying={} shutdown={} name='{}' uuid='{}'",
            domain.id,
            yes_no(domain.flags.is_hvm()),
            yes_no(domain.flags.is_dying()),
            yes_no(domain.flags.is_shutdown()),
            domain.name.as_deref().unwrap_or_default(),
            domain.uuid.as_deref().unwrap_or_default(),
        );
    }

    Ok(())
}
