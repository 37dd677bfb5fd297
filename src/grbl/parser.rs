//! Line classification for everything GRBL sends back.
//!
//! Every received line goes through [`parse_line`]; the control loop never
//! fails on unrecognized input, it just carries the line along verbatim.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::{char, u32 as dec_u32, u64 as dec_u64},
    combinator::{all_consuming, map, opt, value},
    number::complete::double,
    sequence::{preceded, separated_pair},
    IResult,
};

use super::messages::{MachineState, Position, PositionFrame, ResponseLine, StatusReport};

fn state_word(input: &str) -> IResult<&str, MachineState> {
    map(take_while1(|c: char| c != '|' && c != '>'), |word: &str| {
        // Hold and Door carry a `:n` substate this client does not act on.
        let name = word.split(':').next().unwrap_or(word);
        match name {
            "Idle" => MachineState::Idle,
            "Run" => MachineState::Run,
            "Hold" => MachineState::Hold,
            "Jog" => MachineState::Jog,
            "Alarm" => MachineState::Alarm,
            "Door" => MachineState::Door,
            "Check" => MachineState::Check,
            "Home" => MachineState::Home,
            "Sleep" => MachineState::Sleep,
            _ => MachineState::Unknown,
        }
    })(input)
}

fn position_field(input: &str) -> IResult<&str, (PositionFrame, Position)> {
    let (input, frame) = alt((
        value(PositionFrame::Machine, tag("MPos:")),
        value(PositionFrame::Work, tag("WPos:")),
    ))(input)?;
    let (input, x) = double(input)?;
    let (input, _) = char(',')(input)?;
    let (input, y) = double(input)?;
    let (input, _) = char(',')(input)?;
    let (input, z) = double(input)?;
    Ok((input, (frame, Position { x, y, z })))
}

/// `<State|MPos:x,y,z|...>` with any further `|`-separated fields ignored.
fn status_line(input: &str) -> IResult<&str, StatusReport> {
    let (input, _) = char('<')(input)?;
    let (input, state) = state_word(input)?;
    let (input, _) = char('|')(input)?;
    let (input, (frame, position)) = position_field(input)?;
    let (input, _) = take_until(">")(input)?;
    let (input, _) = char('>')(input)?;
    Ok((
        input,
        StatusReport {
            state,
            position,
            frame,
        },
    ))
}

fn setting_line(input: &str) -> IResult<&str, ResponseLine> {
    map(
        all_consuming(separated_pair(
            preceded(char('$'), dec_u32),
            char('='),
            double,
        )),
        |(index, value)| ResponseLine::Setting { index, value },
    )(input)
}

fn response_line(input: &str) -> IResult<&str, ResponseLine> {
    alt((
        map(status_line, ResponseLine::Status),
        map(preceded(tag("ALARM:"), dec_u64), ResponseLine::Alarm),
        setting_line,
        // `error` and `ok` are prefix matches: that is the terminal-marker
        // contract, and old 0.9 builds send `error: <text>` with no code.
        map(
            preceded(tag("error"), opt(preceded(char(':'), dec_u64))),
            ResponseLine::Error,
        ),
        value(ResponseLine::Ok, tag("ok")),
        value(ResponseLine::Greeting, tag("Grbl")),
    ))(input)
}

/// Classify one received line. Never fails; anything unknown is carried as
/// [`ResponseLine::Unrecognized`].
pub fn parse_line(line: &str) -> ResponseLine {
    match response_line(line) {
        Ok((_, parsed)) => parsed,
        Err(_) => ResponseLine::Unrecognized(line.to_string()),
    }
}

/// Attempt to read a line as a real-time status report.
pub fn parse_status(line: &str) -> Option<StatusReport> {
    status_line(line).ok().map(|(_, report)| report)
}
