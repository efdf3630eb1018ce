//! Binary that emits command-line options markdown to stdout.
//!
//! The output is committed as `docs/command-line-options.md` whenever the
//! options change.

fn main() {
    print!("{}", datadash_cli::render_options_markdown());
}
