use std::any::Any;
use std::time::Duration;

use anyhow::bail;
use declic::{Argument, Command, Completion, CompletionRequest, FlagValue, Flags, shared};

const ENVIRONMENTS: &[&str] = &["dev", "prod", "staging"];

fn complete_environment(request: &CompletionRequest<'_>, _flags: &dyn Any) -> Option<Completion> {
    let candidates = ENVIRONMENTS
        .iter()
        .filter(|env| env.starts_with(request.to_complete))
        .copied();
    Some(Completion::new(candidates).with_active_help("Choose the target environment"))
}

/// Deployment target, completed from the known environments.
#[derive(Debug, Default, FlagValue)]
#[flag_value(complete = complete_environment)]
pub(crate) struct Environment(pub String);

#[derive(Debug, Default, FlagValue)]
#[flag_value(extensions = "yaml,yml")]
pub(crate) struct Manifest(pub String);

/// Services that must be healthy before the deployment starts.
#[derive(Debug, Default, Clone, FlagValue)]
pub(crate) struct Service(pub String);

#[derive(Debug, Default, Flags)]
pub(crate) struct DeployFlags {
    #[flag(short = "e", usage = "The |environment| to deploy to.")]
    pub environment: Environment,
    #[flag(usage = "Deployment |file| to apply.")]
    pub manifest: Manifest,
    #[flag(usage = "Give up after this long.")]
    pub timeout: Duration,
    #[flag(usage = "Regions to roll out to.")]
    pub regions: Vec<String>,
    #[flag(usage = "Attempts per service before failing.")]
    pub retries: u64,
    #[flag(name = "wait-for", usage = "Services that must be healthy first.")]
    pub wait_for: Vec<Service>,
    #[flag(name = "dry-run", usage = "Only print what would be deployed.")]
    pub dry_run: bool,
}

pub(crate) fn command() -> Command {
    let flags = shared(DeployFlags {
        timeout: Duration::from_secs(300),
        regions: vec!["eu".to_string()],
        retries: 1,
        ..Default::default()
    });
    let seen = flags.clone();

    Command::new("deploy", "Deploy services")
        .description(
            "Deploys every SERVICE to the selected environment. Flags can be stored with \
             config set, e.g. config set environment staging.",
        )
        .arg(Argument::repeatable("service"))
        .flags(&flags)
        .example("Preview a rollout of two services.", "api worker -e staging --dry-run")
        .run(move |ctx, args, out| {
            let flags = seen.borrow();
            let environment = flags.environment.0.as_str();
            if environment.is_empty() {
                bail!("no environment given; use --environment or config set environment <name>");
            }
            out.verbose(format_args!(
                "timeout {}, {} attempt(s) per service",
                declic::duration::format(flags.timeout),
                flags.retries
            ));
            if !flags.manifest.0.is_empty() {
                out.verbose(format_args!("using manifest {}", flags.manifest.0));
            }

            for dependency in &flags.wait_for {
                out.verbose(format_args!("waiting for {}", dependency.0));
            }

            let regions = flags.regions.join(",");
            for service in args.get_repeatable("service") {
                if ctx.is_cancelled() {
                    bail!("deployment interrupted before {service}");
                }
                tracing::debug!(%service, environment, "deploying");
                if flags.dry_run {
                    out.println(format_args!("would deploy {service} to {environment} [{regions}]"));
                } else {
                    out.println(format_args!("deployed {service} to {environment} [{regions}]"));
                }
            }
            Ok(())
        })
}
