use std::fs::OpenOptions;
use std::path::Path;
use std::process;

use clap::Parser;
use env_logger::{Builder, Env, Target};
use log::{error, info};

use qiniu_ssl::acme::{AcmeAuthority, AcmeUser};
use qiniu_ssl::cdn::QiniuClient;
use qiniu_ssl::config::{Cli, Settings};
use qiniu_ssl::daemon;
use qiniu_ssl::dns::aliyun::AliyunDns;
use qiniu_ssl::dns::DnsChallenge;
use qiniu_ssl::renew::Renewer;
use qiniu_ssl::store::{AccountPersist, CertStore};
use qiniu_ssl::Result;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("Failed to open log file: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(cli) {
        error!("{}", e);
        process::exit(1);
    }
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.target(Target::Pipe(Box::new(file)));
        }
        None => {
            builder.target(Target::Stdout);
        }
    }
    builder.init();
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let settings = cli.into_settings()?;

    // registered before the first batch so an early ^C is seen
    let signals = if settings.daemon {
        Some(daemon::install_signal_handler()?)
    } else {
        None
    };

    let mut renewer = build_renewer(&settings)?;

    info!(
        "Checking {} domain(s), renewing below {} days",
        settings.domains.len(),
        settings.threshold_days
    );
    let report = renewer.run_batch(&settings.domains);

    match signals {
        Some(signals) => {
            daemon::run(settings.check_interval(), &signals, || {
                renewer.run_batch(&settings.domains);
            });
            Ok(())
        }
        None => report.into_result(),
    }
}

fn build_renewer(
    settings: &Settings,
) -> Result<Renewer<QiniuClient, AcmeAuthority<AccountPersist>, DnsChallenge<AliyunDns>>> {
    let store = CertStore::open(&settings.cert_dir)?;
    let cdn = QiniuClient::new(&settings.qiniu_access_key, &settings.qiniu_secret_key)?;
    let dns = AliyunDns::new(
        &settings.aliyun_access_key,
        &settings.aliyun_secret_key,
        &settings.aliyun_region,
    )?;
    let challenge = DnsChallenge::new(dns, settings.dns_wait);
    let authority = AcmeAuthority::new(
        settings.acme_directory.clone(),
        AccountPersist::new(store.dir()),
    );
    let user = AcmeUser::new(settings.email.clone());

    Ok(Renewer::new(
        cdn,
        authority,
        challenge,
        store,
        user,
        settings.policy(),
    ))
}
