use clap::{value_parser, Arg, Command};
use std::process::exit;
use std::time::Duration;
use union_dds::app::{
    init_logging,
    publisher::{self, PublisherSettings},
    select_transport, LOGGING_CONFIG,
};
use union_dds::config::TransportKind;
use union_dds::dds::{DomainParticipantFactory, DOMAIN_ID_DEFAULT};

fn main() {
    init_logging(LOGGING_CONFIG);
    let args = Command::new("hello_world_data_publisher")
        .about("Publishes one HelloWorldData::Msg of each union case")
        .arg(
            Arg::new("domain")
                .short('d')
                .long("domain")
                .help("domain id, the configured default domain if omitted")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("delay")
                .long("delay-ms")
                .help("pause after each message in milliseconds")
                .value_parser(value_parser!(u64))
                .default_value("1000"),
        )
        .arg(
            Arg::new("transport")
                .short('t')
                .long("transport")
                .help("overrides the transport of UNION_DDS_CONFIGURATION")
                .value_parser(["intra_process", "udp"]),
        )
        .get_matches();

    let transport = args
        .get_one::<String>("transport")
        .map(|t| match t.as_str() {
            "udp" => TransportKind::Udp,
            _ => TransportKind::IntraProcess,
        });
    let settings = PublisherSettings {
        domain_id: args
            .get_one::<u16>("domain")
            .copied()
            .unwrap_or(DOMAIN_ID_DEFAULT),
        delay: Duration::from_millis(args.get_one::<u64>("delay").copied().unwrap_or(1000)),
    };

    let result = select_transport(DomainParticipantFactory::get_instance(), transport)
        .and_then(|()| publisher::run(&settings, &mut std::io::stdout()));
    if let Err(e) = result {
        eprintln!("{}", e);
        exit(1);
    }
}
