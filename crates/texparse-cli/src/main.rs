use clap::Parser;
use std::path::{Path, PathBuf};
use texparse::tree::{Node, Tag};
use texparse::{Diagnostic, Document, InputResolver, ParseOptions};

fn main() {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let _ = env_logger::builder().filter_level(level).try_init();
    if let Err(err) = cli.run() {
        if !err.is_empty() {
            eprintln!("Error: {err}");
        }
        std::process::exit(1);
    }
}

/// Parse TeX and LaTeX files.
#[derive(Debug, clap::Parser)]
#[command(
    name = "texparse",
    version = "0.1",
    about,
    long_about,
    max_term_width(100)
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log more; repeat for even more.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

impl Cli {
    fn run(self) -> Result<(), String> {
        match self.command {
            Command::Tree(tree) => tree.run(),
            Command::Tokens(tokens) => tokens.run(),
            Command::Check(check) => check.run(),
        }
    }
}

#[derive(Clone, Debug, clap::Subcommand)]
enum Command {
    /// Print the parse tree of a file as an S-expression.
    Tree(Tree),
    /// Print the tokens of a file, one per line.
    Tokens(Tokens),
    /// Report the diagnostics of a file.
    ///
    /// Exits with status 1 if there are any.
    Check(Check),
}

#[derive(Clone, Debug, clap::Args)]
struct Input {
    /// Path to the file.
    path: PathBuf,

    /// Mode at the start of the file.
    #[arg(short, long, value_enum, default_value_t = Mode::Vertical)]
    mode: Mode,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum Mode {
    Vertical,
    Text,
    Math,
    DisplayMath,
}

impl From<Mode> for texparse::Mode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Vertical => texparse::Mode::Vertical,
            Mode::Text => texparse::Mode::Text,
            Mode::Math => texparse::Mode::Math,
            Mode::DisplayMath => texparse::Mode::DisplayMath,
        }
    }
}

impl Input {
    fn parse(&self) -> Result<Document, String> {
        let source = match std::fs::read_to_string(&self.path) {
            Ok(source) => source,
            Err(err) => {
                return Err(format!(
                    "failed to read `{}`: {}",
                    self.path.display(),
                    err
                ))
            }
        };
        let registry = texparse_grammars::registry();
        let mut resolver = FileResolver::new(&self.path);
        let options = ParseOptions::default().with_mode(self.mode.into());
        let document =
            texparse::parse_with_options(&source, &options, &registry, Some(&mut resolver));
        log::info!(
            "parsed {} bytes into {} top-level nodes with {} diagnostics",
            source.len(),
            document.root().children().len(),
            document.diagnostics().len()
        );
        Ok(document)
    }

    fn file_name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Resolves `\input` file names relative to the directory of the including file.
struct FileResolver {
    dir: PathBuf,
}

impl FileResolver {
    fn new(path: &Path) -> FileResolver {
        FileResolver {
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        }
    }
}

impl InputResolver for FileResolver {
    fn resolve(&mut self, name: &str) -> Option<String> {
        let path = self.dir.join(name);
        let with_extension = self.dir.join(format!("{name}.tex"));
        for candidate in [path, with_extension] {
            if let Ok(content) = std::fs::read_to_string(&candidate) {
                log::debug!("resolved `{name}` to {}", candidate.display());
                return Some(content);
            }
        }
        None
    }
}

#[derive(Clone, Debug, clap::Args)]
struct Tree {
    #[command(flatten)]
    input: Input,
}

impl Tree {
    fn run(self) -> Result<(), String> {
        let document = self.input.parse()?;
        println!("{}", document.to_sexp());
        Ok(())
    }
}

#[derive(Clone, Debug, clap::Args)]
struct Tokens {
    #[command(flatten)]
    input: Input,
}

impl Tokens {
    fn run(self) -> Result<(), String> {
        let document = self.input.parse()?;
        let source = document.source();
        document.root().visit(&mut |node: &Node| {
            let Some(span) = node.span() else {
                return;
            };
            let category = match node.tag() {
                Tag::Token(token) => match token.cat_code() {
                    _ if token.is_synthetic() => return,
                    Some(cat_code) => format!("{cat_code:?}"),
                    None if token.command_ref().is_some() => "ControlSequence".to_string(),
                    None => "Par".to_string(),
                },
                Tag::Delimiter => "Delimiter".to_string(),
                Tag::Verbatim { .. } => "Verbatim".to_string(),
                Tag::Unparsed => "Unparsed".to_string(),
                _ => return,
            };
            println!(
                "{}..{}\t{category}\t{:?}",
                span.start,
                span.end,
                span.slice(source)
            );
        });
        Ok(())
    }
}

#[derive(Clone, Debug, clap::Args)]
struct Check {
    #[command(flatten)]
    input: Input,

    /// Print the diagnostics as JSON.
    #[arg(long)]
    json: bool,
}

impl Check {
    fn run(self) -> Result<(), String> {
        let document = self.input.parse()?;
        let mut files = vec![(
            self.input.file_name(),
            document.source().to_string(),
            document.diagnostics().to_vec(),
        )];
        collect_included(document.root(), &mut files);
        let count: usize = files
            .iter()
            .map(|(_, _, diagnostics)| diagnostics.len())
            .sum();
        if self.json {
            let reports: Vec<serde_json::Value> = files
                .iter()
                .filter(|(_, _, diagnostics)| !diagnostics.is_empty())
                .map(|(name, _, diagnostics)| {
                    serde_json::json!({
                        "file": name,
                        "diagnostics": diagnostics,
                    })
                })
                .collect();
            match serde_json::to_string_pretty(&reports) {
                Ok(json) => println!("{json}"),
                Err(err) => return Err(format!("failed to serialize diagnostics: {err}")),
            }
        } else {
            for (name, source, diagnostics) in &files {
                for diagnostic in diagnostics {
                    eprintln!("{}", diagnostic.display(name, source));
                }
            }
        }
        if count == 0 {
            Ok(())
        } else {
            if !self.json {
                eprintln!("{count} diagnostics");
            }
            Err(String::new())
        }
    }
}

/// Add the diagnostics of every file included by a tree, depth first.
fn collect_included(root: &Node, files: &mut Vec<(String, String, Vec<Diagnostic>)>) {
    let mut included = vec![];
    root.visit(&mut |node: &Node| {
        if let Tag::Input {
            name,
            included: Some(file),
        } = node.tag()
        {
            included.push((name.clone(), file.clone()));
        }
    });
    for (name, file) in included {
        files.push((name, file.source.to_string(), file.diagnostics.clone()));
        collect_included(&file.root, files);
    }
}
