mod deploy;
mod legacy;
mod teams;

use std::process::ExitCode;

use declic::{Application, Argument, Command, Context, Flags, UserError, shared};
use tracing_subscriber::{EnvFilter, fmt};

const NAME: &str = "declic-demo";
const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Default, Flags)]
struct GreetFlags {
    #[flag(short = "g", usage = "The |word| to greet with.")]
    pub greeting: String,
}

fn greet() -> Command {
    let flags = shared(GreetFlags {
        greeting: "Hello".to_string(),
    });
    let seen = flags.clone();
    Command::new("greet", "Greet a user")
        .alias("hi")
        .arg(Argument::new("user_name"))
        .flags(&flags)
        .example("Greet Alice.", "alice")
        .run(move |_, args, out| {
            let flags = seen.borrow();
            out.println(format_args!("{}, {}!", flags.greeting, args.get("user_name").to_uppercase()));
            Ok(())
        })
}

const TRANSFORMS: &[&str] = &["lower", "reverse", "upper"];

fn transform() -> Command {
    Command::new("transform", "Transform words")
        .description("Applies FUNC to every WORD and prints the result on one line.")
        .args([Argument::new("func"), Argument::repeatable("word")])
        .validate(|_, args| {
            let func = args.get("func");
            if !TRANSFORMS.contains(&func) {
                return Err(UserError::new(format!(
                    "unknown function {func:?}, expected one of: {}",
                    TRANSFORMS.join(", ")
                ))
                .into());
            }
            Ok(())
        })
        .auto_complete(|_, args, partial| {
            if !args.is_empty() {
                return declic::Completion::default();
            }
            declic::Completion::new(TRANSFORMS.iter().filter(|f| f.starts_with(partial)).copied())
        })
        .example("Shout two words.", "upper hello world")
        .run(|_, args, out| {
            let words = args.get_repeatable("word").iter().map(|word| match args.get("func") {
                "lower" => word.to_lowercase(),
                "reverse" => word.chars().rev().collect(),
                _ => word.to_uppercase(),
            });
            out.println(words.collect::<Vec<_>>().join(" "));
            Ok(())
        })
}

fn application() -> Result<Application, declic::Error> {
    let mut app = Application::new(NAME, "A small application showing declic command trees", VERSION)?;
    app.add_commands([greet(), transform(), deploy::command(), teams::command()])?;
    app.add_commands(legacy::commands())?;
    Ok(app)
}

fn main() -> ExitCode {
    init_tracing();

    let result = application().and_then(|mut app| app.run(&Context::new(), std::env::args().skip(1)));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        // Help has been printed already.
        Err(declic::Error::MissingCommand { .. }) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
