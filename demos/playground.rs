// Evaluate one expression against a JSON document from the command line.
//
//   cargo run --example playground -- '$.items[*].price' data.json
//   echo '{"a": 1}' | cargo run --example playground -- '$.a + 1'
//
// Set RUST_LOG=debug to see evaluator tracing.

use std::io::Read;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(expression) = args.next() else {
        eprintln!("usage: playground <expression> [document.json]");
        return ExitCode::from(2);
    };

    let document = match args.next() {
        Some(path) => std::fs::read_to_string(&path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).map(|_| buf)
        }
    };
    let document = match document {
        Ok(text) if text.trim().is_empty() => "null".to_string(),
        Ok(text) => text,
        Err(e) => {
            eprintln!("cannot read document: {}", e);
            return ExitCode::from(2);
        }
    };

    match snapexpr::evaluate_json(&expression, &document) {
        Ok(result) => {
            println!("{}", result);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{:?}: {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}
