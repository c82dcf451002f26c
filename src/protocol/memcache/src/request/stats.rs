use super::*;

#[derive(Debug, PartialEq, Eq)]
pub struct Stats {
    pub(crate) command: StatsCommand,
}

impl Stats {
    pub(crate) fn new(command: StatsCommand) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &StatsCommand {
        &self.command
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum StatsCommand {
    /// Plain `stats`: the server statistics.
    Server,
    /// `stats reset`: zero the cumulative counters.
    Reset,
    /// `stats detail on|off|dump`: prefix statistics, which this server does
    /// not collect.
    Detail,
    /// `stats cachedump <id> <limit>`: dump item metadata.
    Cachedump { id: usize, limit: usize },
    /// An unrecognized subcommand.
    Unknown,
}

impl RequestParser {
    pub(crate) fn parse_stats<'a>(&self, input: &'a [u8]) -> IResult<&'a [u8], Request> {
        // plain `stats`
        if let Ok((input, _)) = end_of_line(input) {
            return Ok((
                input,
                Request::text(false, Command::Stats(Stats::new(StatsCommand::Server))),
            ));
        }

        let (input, _) = space1(input)?;
        let (input, subcommand) = token(input)?;

        let (input, command) = match subcommand {
            b"reset" => {
                let (input, _) = end_of_line(input)?;
                (input, StatsCommand::Reset)
            }
            b"detail" => {
                // the mode argument is validated but otherwise ignored
                let (input, _) = space1(input)?;
                let (input, mode) = token(input)?;
                if !matches!(mode, b"on" | b"off" | b"dump") {
                    return Err(Err::Failure(nom::error::Error::new(
                        input,
                        nom::error::ErrorKind::Tag,
                    )));
                }
                let (input, _) = end_of_line(input)?;
                (input, StatsCommand::Detail)
            }
            b"cachedump" => {
                let (input, _) = space1(input)?;
                let (input, id) = parse_usize(input)?;
                let (input, _) = space1(input)?;
                let (input, limit) = parse_usize(input)?;
                let (input, _) = end_of_line(input)?;
                (input, StatsCommand::Cachedump { id, limit })
            }
            _ => {
                let (input, _) = end_of_line(input)?;
                (input, StatsCommand::Unknown)
            }
        };

        Ok((
            input,
            Request::text(false, Command::Stats(Stats::new(command))),
        ))
    }
}

fn end_of_line(input: &[u8]) -> IResult<&[u8], ()> {
    let (input, _) = space0(input)?;
    let (input, _) = crlf(input)?;
    Ok((input, ()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol_common::Parse;

    fn parse(buffer: &[u8]) -> Request {
        let parser = RequestParser::new();
        Parse::parse(&parser, buffer).unwrap().into_inner()
    }

    fn stats_command(request: &Request) -> &StatsCommand {
        match request.command() {
            Command::Stats(stats) => stats.command(),
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn server_stats() {
        let request = parse(b"stats\r\n");
        assert_eq!(*stats_command(&request), StatsCommand::Server);
    }

    #[test]
    fn reset() {
        let request = parse(b"stats reset\r\n");
        assert_eq!(*stats_command(&request), StatsCommand::Reset);
    }

    #[test]
    fn detail() {
        let request = parse(b"stats detail on\r\n");
        assert_eq!(*stats_command(&request), StatsCommand::Detail);

        let request = parse(b"stats detail sideways\r\n");
        assert!(matches!(request.command(), Command::Invalid(_)));
    }

    #[test]
    fn cachedump() {
        let request = parse(b"stats cachedump 1 100\r\n");
        assert_eq!(
            *stats_command(&request),
            StatsCommand::Cachedump { id: 1, limit: 100 }
        );
    }

    #[test]
    fn unknown_subcommand() {
        let request = parse(b"stats bogus\r\n");
        assert_eq!(*stats_command(&request), StatsCommand::Unknown);
    }
}
