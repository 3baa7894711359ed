use owo_colors::OwoColorize;

use nano_syntax::error::Error;

/// Prints `err` with its location, the offending source line and a hint.
pub fn render_error(kind: &str, file: &str, source: &str, err: &Error) {
    eprintln!("{}: {}", format!("{} error", kind).red().bold(), err.msg.red());
    if let (Some(line), Some(col)) = (err.line, err.col) {
        eprintln!("  --> {}: line {}, column {}", file, line, col);
        if let Some(src_line) = source.lines().nth(line.saturating_sub(1)) {
            let gutter = format!("{:3} | ", line);
            eprintln!("     |");
            eprintln!("{}{}", gutter.bright_black(), src_line);

            let mut marker = " ".repeat(gutter.len());
            marker.push_str(&" ".repeat(col.saturating_sub(1)));
            marker.push('^');
            eprintln!("{}{}", marker.red(), " error here".red());
            eprintln!("     |");
        }
    } else {
        eprintln!("  --> {}", file);
    }
    provide_error_suggestions(&err.msg);
}

pub fn render_failure(msg: &str) {
    eprintln!("{}: {}", "error".red().bold(), msg.red());
}

pub fn provide_error_suggestions(err_msg: &str) {
    if err_msg.starts_with("internal:") {
        eprintln!("{}", "Help: This is a compiler bug, not a problem with your program.".yellow());
    } else if err_msg.contains("undeclared identifier") {
        eprintln!("{}", "Help: Declare the variable with 'var' before using it.".yellow());
        eprintln!("    {}", "Example: var count: number = 0".bright_black());
        eprintln!("    {}", "Statics live in stage.nano and must come before their first use.".bright_black());
    } else if err_msg.contains("undeclared function") {
        eprintln!("{}", "Help: Check the spelling, or define the function in this unit.".yellow());
        eprintln!(
            "    {}",
            "Built-ins: say, say_for, think, ask, answer, wait, broadcast, broadcast_wait, clone, timer, reset_timer, random, abs, floor, sqrt, switch_costume, alloc, free"
                .bright_black()
        );
    } else if err_msg.contains("can finish without returning") || err_msg.contains("missing return value") {
        eprintln!("{}", "Help: Every path through a non-void function must end in 'return <value>'.".yellow());
        eprintln!("    {}", "Add a final return after the last if/while.".bright_black());
    } else if err_msg.contains("type mismatch") {
        eprintln!("{}", "Help: Only number -> bool and number -> string convert implicitly.".yellow());
        eprintln!("    {}", "Use an explicit cast: string(x), number(x), bool(x), number*(x)".bright_black());
    } else if err_msg.contains("expects") && err_msg.contains("argument") {
        eprintln!("{}", "Help: The call does not match the function's parameter list.".yellow());
    } else if err_msg.contains("unknown attribute") {
        eprintln!("{}", "Help: The only attribute is @warp.".yellow());
    } else if err_msg.contains("unknown event") {
        eprintln!("{}", "Help: Events are flag, key, click, backdrop, loudness, timer, broadcast and clone.".yellow());
    } else if err_msg.contains("unterminated string") {
        eprintln!("{}", "Help: String is missing its closing quote.".yellow());
    } else if err_msg.contains("expected") {
        eprintln!("{}", "Help: Missing required syntax element.".yellow());
        if err_msg.contains("'end'") {
            eprintln!("    {}", "Every func, on and multi-line branch needs a matching 'end'".bright_black());
        }
    } else if err_msg.contains("step limit") {
        eprintln!("{}", "Help: The program ran too long; look for a loop that never ends inside @warp code.".yellow());
    }
}
