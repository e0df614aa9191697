use std::io::Write;
use termcolor::
{
    Color,
    ColorChoice,
    ColorSpec,
    StandardStream,
    WriteColor
};

/*  The outcome the executor (C7) reports for a single visited DAG node.
    `Printer::report` picks a banner word and color per variant. */
pub enum Outcome
{
    Building,
    Built,
    BuildFailed,
    UpToDate,
    WouldBuild,
    Removed,
    RemoveFailed,
    AlwaysRuns,
}

impl Outcome
{
    fn banner(&self) -> (&'static str, Color)
    {
        match self
        {
            Outcome::Building    => ("  Building", Color::Magenta),
            Outcome::Built       => ("     Built", Color::Green),
            Outcome::BuildFailed => ("    FAILED", Color::Red),
            Outcome::UpToDate    => ("Up-to-date", Color::Cyan),
            Outcome::WouldBuild  => ("  Dry-run ", Color::Yellow),
            Outcome::Removed     => ("   Removed", Color::Green),
            Outcome::RemoveFailed=> ("Remove-err", Color::Red),
            Outcome::AlwaysRuns  => ("   Virtual", Color::Blue),
        }
    }
}

pub trait Printer
{
    fn report(&mut self, outcome : Outcome, label : &str);

    fn print(&mut self, text : &str);

    fn error(&mut self, text: &str);
}

pub struct StandardPrinter
{
}

impl StandardPrinter
{
    pub fn new() -> StandardPrinter
    {
        StandardPrinter{}
    }

    fn print_single_banner_line(&mut self, banner_text : &str, banner_color : Color, label : &str)
    {
        let mut stdout = StandardStream::stdout(ColorChoice::Always);
        match stdout.set_color(ColorSpec::new().set_fg(Some(banner_color)))
        {
            Ok(_) => {},
            Err(_error) => {},
        }
        match write!(&mut stdout, "{}: ", banner_text)
        {
            Ok(_) => {},
            Err(_error) =>
            {
                /*  If the write doesn't work, change the color back, but
                    other than that, I don't know what to do. */
                match stdout.set_color(ColorSpec::new().set_fg(None))
                {
                    Ok(_) => {},
                    Err(_error) => {},
                }
                return
            }
        }
        match stdout.set_color(ColorSpec::new().set_fg(None))
        {
            Ok(_) => {},
            Err(_error) => {},
        }
        match writeln!(&mut stdout, "{}", label)
        {
            Ok(_) => {},
            Err(_error) =>
            {
                // Again, just not sure what to do if write fails.
            },
        }
    }
}

impl Printer for StandardPrinter
{
    fn report(&mut self, outcome : Outcome, label : &str)
    {
        let (banner_text, banner_color) = outcome.banner();
        self.print_single_banner_line(banner_text, banner_color, label);
    }

    fn print(&mut self, text : &str)
    {
        println!("{}", text);
    }

    fn error(&mut self, text : &str)
    {
        eprintln!("{}", text);
    }
}

#[cfg(test)]
pub struct EmptyPrinter
{
    pub lines : Vec<String>,
}

#[cfg(test)]
impl EmptyPrinter
{
    pub fn new() -> EmptyPrinter
    {
        EmptyPrinter { lines: vec![] }
    }
}

#[cfg(test)]
impl Printer for EmptyPrinter
{
    fn report(&mut self, outcome : Outcome, label : &str)
    {
        let (banner_text, _color) = outcome.banner();
        self.lines.push(format!("{}: {}", banner_text.trim(), label));
    }

    fn print(&mut self, _text : &str)
    {
    }

    fn error(&mut self, text: &str)
    {
        self.lines.push(format!("ERROR: {}", text));
    }
}
