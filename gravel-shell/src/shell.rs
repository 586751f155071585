use gravel::Interp;
use rustyline::{error::ReadlineError, history::MemHistory, Config, Editor};
use std::path::Path;

/// Invokes an interactive REPL for the given interpreter, using `rustyline` line
/// editing.
///
/// Input accumulates line by line until it forms a complete chunk (balanced
/// scopes, terminated statements; see [`Interp::complete`]), then the chunk is
/// evaluated against the session's persistent global scope.  Declarations made in
/// one chunk stay visible to the next.  A non-nil `retVal` is printed after each
/// chunk.  Press `^C` to discard pending input, or `^C` at an empty prompt (or
/// `^D`) to leave the REPL.
///
/// # Example
///
/// ```no_run
/// use gravel::Interp;
///
/// // FIRST, create and initialize the interpreter.
/// let mut interp = Interp::new();
///
/// // NOTE: builtins can be added to the interpreter here.
///
/// // NEXT, invoke the REPL.
/// gravel_shell::repl(&mut interp);
/// ```
pub fn repl(interp: &mut Interp) {
    let mut rl = Editor::<(), MemHistory>::with_history(Config::default(), MemHistory::new())
        .expect("failed to init rustyline");

    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "% " } else { "> " };

        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() && line.trim().is_empty() {
                    continue;
                }
                pending.push_str(&line);
                pending.push('\n');

                if !interp.complete(&pending) {
                    continue;
                }

                let chunk = std::mem::take(&mut pending);
                if let Err(e) = rl.add_history_entry(chunk.trim()) {
                    eprintln!("History error: {e}");
                }

                match interp.eval_chunk(&chunk) {
                    Ok(()) => {
                        let value = interp.take_ret_val();
                        // Don't output nil values.
                        if !value.is_nil() {
                            println!("{}", interp.render(&value));
                        }
                    }
                    Err(exception) => {
                        println!("{}", exception);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                if pending.is_empty() {
                    break;
                }
                pending.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("I/O Error: {:?}", err);
                break;
            }
        }
    }
}

/// Executes a script file in the context of the given interpreter.
///
/// The script is lexed, parsed, and interpreted as a whole program: global
/// statements, the namespace sweep, then its `Main` function.  On any error the
/// diagnostic is written to stderr and the process exits with code 1.
///
/// # Example
///
/// ```no_run
/// use gravel::Interp;
/// use std::env;
/// use std::path::Path;
///
/// // FIRST, get the command line arguments.
/// let args: Vec<String> = env::args().collect();
///
/// // NEXT, create and initialize the interpreter.
/// let mut interp = Interp::new();
///
/// // NEXT, evaluate the file, if any.
/// if args.len() > 1 {
///     gravel_shell::script(&mut interp, Path::new(&args[1]));
/// } else {
///     eprintln!("Usage: gvs *filename.gv");
/// }
/// ```
pub fn script(interp: &mut Interp, path: &Path) {
    match interp.eval_file(path) {
        Ok(()) => (),
        Err(exception) => {
            eprintln!("{}", exception);
            std::process::exit(1);
        }
    }
}
