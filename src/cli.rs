use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flag {
    Output,
    Dump,
    Verbose,
    Help,
}

impl Flag {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Output => "-o",
            Self::Dump => "--dump",
            Self::Verbose => "-v",
            Self::Help => "-h",
        }
    }

    fn all() -> Vec<Self> {
        vec![Self::Output, Self::Dump, Self::Verbose, Self::Help]
    }

    fn parse(arg: &str) -> Option<Self> {
        Self::all().into_iter().find(|flag| flag.as_str() == arg)
    }
}

/// Parsed command line: one input (a path, or `-` for standard input) plus
/// the driver options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub input: String,
    pub output: Option<PathBuf>,
    pub dump: bool,
    pub verbose: bool,
    pub help: bool,
}

impl Options {
    pub fn usage() -> &'static str {
        "Usage: krill [ -o <file> ] [ --dump ] [ -v ] <file>\n\n\
         Tokenizes one C source file, or standard input when <file> is -.\n\n\
         \x20 -o <file>   write to <file> instead of standard output\n\
         \x20 --dump      print one token per line with positions and flags\n\
         \x20 -v          verbose logging\n\
         \x20 -h          print this help"
    }

    pub fn parse<I>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut opts = Self {
            input: String::new(),
            output: None,
            dump: false,
            verbose: false,
            help: false,
        };
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match Flag::parse(&arg) {
                Some(Flag::Output) => {
                    let path = args
                        .next()
                        .ok_or_else(|| "-o requires a file name".to_owned())?;
                    opts.output = Some(PathBuf::from(path));
                }
                Some(Flag::Dump) => opts.dump = true,
                Some(Flag::Verbose) => opts.verbose = true,
                Some(Flag::Help) => opts.help = true,
                None if arg.starts_with('-') && arg != "-" => {
                    return Err(format!("unknown option: {arg}"));
                }
                None => {
                    if !opts.input.is_empty() {
                        return Err(format!("more than one input: {} and {arg}", opts.input));
                    }
                    opts.input = arg;
                }
            }
        }
        if opts.input.is_empty() && !opts.help {
            return Err("no input file".to_owned());
        }
        Ok(opts)
    }
}
