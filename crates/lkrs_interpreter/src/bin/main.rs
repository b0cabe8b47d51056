use lkrs::{LkValue, LkVm, VmOptions};
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const VERSION: &str = concat!("lk ", env!("CARGO_PKG_VERSION"));

fn print_usage() {
    eprintln!("usage: lk [options] [script]");
    eprintln!("  <script>          compile and run a .lk file");
    eprintln!("  compile <script>  check a .lk file and report diagnostics");
    eprintln!("  -e stat           execute string 'stat'");
    eprintln!("  -v                show version information");
    eprintln!("  (no arguments)    interactive mode");
}

fn run_file(vm: &mut LkVm, path: &str) -> Result<(), String> {
    let source = fs::read_to_string(path).map_err(|e| format!("cannot open {}: {}", path, e))?;
    vm.execute_named(&source, path)
        .map(|_| ())
        .map_err(|e| vm.into_full_error(e).to_string())
}

/// `compile <file>`: parse + codegen only, no execution. Serialised
/// output is handled by an external tool; this just surfaces errors.
fn compile_file(vm: &mut LkVm, path: &str) -> Result<(), String> {
    let source = fs::read_to_string(path).map_err(|e| format!("cannot open {}: {}", path, e))?;
    vm.compile(&source, path)
        .map(|_| ())
        .map_err(|e| vm.into_full_error(e).to_string())
}

fn interactive(vm: &mut LkVm) {
    println!("{}", VERSION);
    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match vm.execute_named(line, "stdin") {
            Ok(results) => {
                for v in results {
                    if !matches!(v, LkValue::Nil) {
                        println!("{:?}", v);
                    }
                }
            }
            Err(e) => eprintln!("{}", vm.into_full_error(e)),
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut vm = LkVm::new(VmOptions::default());
    vm.open_libs();

    let result = match args.first().map(String::as_str) {
        None => {
            interactive(&mut vm);
            Ok(())
        }
        Some("-v") => {
            println!("{}", VERSION);
            Ok(())
        }
        Some("-e") => match args.get(1) {
            Some(stat) => vm
                .execute_named(stat, "command line")
                .map(|_| ())
                .map_err(|e| vm.into_full_error(e).to_string()),
            None => {
                print_usage();
                Err("'-e' needs an argument".to_string())
            }
        },
        Some("compile") => match args.get(1) {
            Some(path) => compile_file(&mut vm, path),
            None => {
                print_usage();
                Err("'compile' needs a file".to_string())
            }
        },
        Some(opt) if opt.starts_with('-') => {
            print_usage();
            Err(format!("unrecognized option '{}'", opt))
        }
        Some(path) => run_file(&mut vm, path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("lk: {}", msg);
            ExitCode::FAILURE
        }
    }
}
