//! DIMACS module responsible for parsing DIMACS CNF problem files, including
//! literal weights given as `c p weight <lit> <w> 0` or `w <lit> <w>` lines.
use std::collections::VecDeque;

use crate::cnf::Cnf;
use crate::count::LiteralWeights;
use crate::literal::Literal;

use anyhow::{bail, Context, Result};

/// Preamble of the DIMACS file.
#[derive(Debug, PartialEq, Eq)]
pub struct Preamble {
    pub clauses: usize,
    pub variables: usize,
}

/// Parsed DIMACS problem.
#[derive(Debug)]
pub struct Dimacs {
    pub preamble: Preamble,
    pub cnf: Cnf,
    /// Present when the file declared at least one literal weight.
    /// Literals without a declared weight weigh one.
    pub weights: Option<LiteralWeights<f64>>,
}

/// Current state of the DIMACS reader.
#[derive(PartialEq, Eq)]
enum DimacsParserState {
    Initialized,
    PreambleParsed,
    ParsingClauses,
    Finished,
}

/// DIMACS parser.
#[allow(clippy::module_name_repetitions)]
pub struct DimacsParser<'a> {
    reader: &'a mut dyn std::io::BufRead,
    state: DimacsParserState,
    tokens: VecDeque<i32>,
    weights: Vec<(i32, f64)>,
}

/// Parse a whole DIMACS file.
pub fn parse(reader: &mut dyn std::io::BufRead) -> Result<Dimacs> {
    let mut parser = DimacsParser::new(reader);
    let preamble = parser.parse_preamble()?;
    let num_vars = u32::try_from(preamble.variables).context("too many variables")?;

    let mut cnf = Cnf::new(num_vars);
    while let Some(clause) = parser.parse_next_clause()? {
        cnf.add_dimacs_clause(&clause)?;
    }

    if cnf.num_clauses() != preamble.clauses {
        tracing::warn!(
            declared = preamble.clauses,
            parsed = cnf.num_clauses(),
            "clause count differs from the problem line"
        );
    }

    let weights = parser.weights(num_vars)?;
    Ok(Dimacs {
        preamble,
        cnf,
        weights,
    })
}

impl<'a> DimacsParser<'a> {
    #[must_use]
    pub fn new(reader: &'a mut dyn std::io::BufRead) -> Self {
        DimacsParser {
            state: DimacsParserState::Initialized,
            reader,
            tokens: VecDeque::new(),
            weights: Vec::new(),
        }
    }

    /// Parse preamble of the DIMACS file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * the preamble has already been parsed,
    /// * the preamble is missing a 'problem line',
    /// * could not parse a 'problem line'
    pub fn parse_preamble(&mut self) -> Result<Preamble> {
        if self.state != DimacsParserState::Initialized {
            bail!("preamble already parsed");
        }

        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .context("could not read preamble")?;
            if read == 0 {
                bail!("preamble is missing a problem line");
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('c') {
                self.parse_comment(line)?;
                continue;
            }
            if line.starts_with('w') {
                self.parse_weight_line(line)?;
                continue;
            }

            return self.parse_problem_line(line);
        }
    }

    /// Parse the next clause. Clauses may span several lines and several
    /// clauses may share a line.
    pub fn parse_next_clause(&mut self) -> Result<Option<Vec<i32>>> {
        assert!(self.state != DimacsParserState::Initialized);

        let mut clause = Vec::new();
        loop {
            while let Some(token) = self.tokens.pop_front() {
                if token == 0 {
                    return Ok(Some(clause));
                }
                clause.push(token);
            }

            if self.state == DimacsParserState::Finished {
                return Ok(if clause.is_empty() { None } else { Some(clause) });
            }

            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .context("could not parse clause")?;
            if read == 0 {
                self.state = DimacsParserState::Finished;
                continue;
            }

            self.state = DimacsParserState::ParsingClauses;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('c') {
                self.parse_comment(line)?;
                continue;
            }
            if line.starts_with('w') {
                self.parse_weight_line(line)?;
                continue;
            }
            if line == "%" {
                // Trailer used by the SATLIB benchmarks: '%' followed by a lone '0'.
                let mut zero = String::new();
                self.reader
                    .read_line(&mut zero)
                    .context("could not read trailer")?;
                if zero.trim() != "0" {
                    bail!("expected '0' after '%' but found '{}' instead", zero.trim());
                }
                self.state = DimacsParserState::Finished;
                continue;
            }

            for token in line.split_whitespace() {
                match token.parse::<i32>() {
                    Ok(literal) => self.tokens.push_back(literal),
                    Err(err) => bail!("literal '{token}' is invalid: {err}"),
                }
            }
        }
    }

    /// Weights declared so far, if any.
    pub fn weights(&self, num_vars: u32) -> Result<Option<LiteralWeights<f64>>> {
        if self.weights.is_empty() {
            return Ok(None);
        }

        let mut weights = LiteralWeights::unweighted(num_vars);
        for &(literal, weight) in &self.weights {
            if literal == 0 || literal.unsigned_abs() > num_vars {
                bail!("weight declared for literal {literal} outside 1..={num_vars}");
            }
            weights.set(Literal::from_dimacs(literal), weight);
        }
        Ok(Some(weights))
    }

    fn parse_problem_line(&mut self, line: &str) -> Result<Preamble> {
        let items: Vec<_> = line.split_whitespace().collect();
        let [p, format, variables, clauses] = items.as_slice() else {
            bail!("problem line must contain exactly 4 fields: 'p cnf VARIABLES CLAUSES'");
        };

        if *p != "p" {
            bail!("first field of problem line must be 'p'");
        }

        if *format != "cnf" {
            bail!("second field of problem line must be 'cnf'");
        }

        let variables = match variables.parse::<usize>() {
            Ok(variables) => variables,
            Err(err) => bail!("could not parse number of variables: {err}"),
        };

        let clauses = match clauses.parse::<usize>() {
            Ok(clauses) => clauses,
            Err(err) => bail!("could not parse number of clauses: {err}"),
        };

        self.state = DimacsParserState::PreambleParsed;
        Ok(Preamble { clauses, variables })
    }

    /// Comments are ignored unless they declare a weight: `c p weight <lit> <w> [0]`.
    fn parse_comment(&mut self, line: &str) -> Result<()> {
        let items: Vec<_> = line.split_whitespace().collect();
        if let ["c", "p", "weight", rest @ ..] = items.as_slice() {
            self.push_weight(rest)?;
        }
        Ok(())
    }

    /// `w <lit> <w> [0]`
    fn parse_weight_line(&mut self, line: &str) -> Result<()> {
        let items: Vec<_> = line.split_whitespace().collect();
        match items.as_slice() {
            ["w", rest @ ..] => self.push_weight(rest),
            _ => bail!("malformed weight line '{line}'"),
        }
    }

    fn push_weight(&mut self, fields: &[&str]) -> Result<()> {
        let (literal, weight) = match fields {
            [literal, weight] | [literal, weight, "0"] => (literal, weight),
            _ => bail!("weight declaration must be '<literal> <weight> [0]'"),
        };

        let literal = literal
            .parse::<i32>()
            .with_context(|| format!("invalid weighted literal '{literal}'"))?;
        let weight = weight
            .parse::<f64>()
            .with_context(|| format!("invalid weight '{weight}'"))?;
        if weight < 0.0 || !weight.is_finite() {
            bail!("weight of literal {literal} must be a non-negative number, got {weight}");
        }

        self.weights.push((literal, weight));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use std::io::{BufReader, Read};

    use super::{parse, DimacsParser, Preamble};
    use crate::literal::Literal;

    fn collect_clauses(dimacs: &mut DimacsParser) -> Vec<Vec<i32>> {
        let mut clauses = Vec::new();

        loop {
            match dimacs.parse_next_clause() {
                Ok(Some(clause)) => clauses.push(clause),
                Ok(None) => break,
                Err(err) => panic!("{err}"),
            }
        }

        clauses
    }

    #[test]
    fn dimacs_ok() {
        let contents = "c Example CNF format file
c
p cnf 4 3
1 3 -4 0
4 0
2 -3 0";
        let mut reader = BufReader::new(contents.as_bytes());
        let mut dimacs = DimacsParser::new(&mut reader);

        assert_eq!(
            dimacs.parse_preamble().unwrap(),
            Preamble {
                variables: 4,
                clauses: 3
            }
        );

        assert_eq!(
            collect_clauses(&mut dimacs),
            vec![vec![1, 3, -4], vec![4], vec![2, -3]]
        );
    }

    #[test]
    fn clauses_spanning_lines() {
        let contents = "p   cnf  4   3
1  3  -4 0
  4 0 2
-3 0";
        let mut reader = BufReader::new(contents.as_bytes());
        let mut dimacs = DimacsParser::new(&mut reader);

        assert_eq!(
            dimacs.parse_preamble().unwrap(),
            Preamble {
                variables: 4,
                clauses: 3
            }
        );
        assert_eq!(
            collect_clauses(&mut dimacs),
            vec![vec![1, 3, -4], vec![4], vec![2, -3]]
        );
    }

    #[test]
    fn trailing_eof_syntax() {
        // This weird format with trailing '%\n0\n' is in the SATLIB benchmarks: https://www.cs.ubc.ca/~hoos/SATLIB/benchm.html
        let contents = "c Example CNF format file
p cnf 4 2
1 3 -4 0
4 0
%
0
";
        let mut reader = BufReader::new(contents.as_bytes());
        let mut dimacs = DimacsParser::new(&mut reader);
        dimacs.parse_preamble().unwrap();

        assert_eq!(collect_clauses(&mut dimacs), vec![vec![1, 3, -4], vec![4]]);
    }

    struct Unreadable;

    impl Read for Unreadable {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("device unavailable"))
        }
    }

    #[test]
    fn unreadable_trailer() {
        let contents = "p cnf 2 1\n1 2 0\n%\n";
        let mut reader = BufReader::new(contents.as_bytes().chain(Unreadable));
        let mut dimacs = DimacsParser::new(&mut reader);
        dimacs.parse_preamble().unwrap();

        assert_eq!(dimacs.parse_next_clause().unwrap(), Some(vec![1, 2]));
        let err = dimacs.parse_next_clause().unwrap_err();
        assert!(format!("{err:#}").contains("could not read trailer"));
    }

    #[test]
    fn missing_problem_line() {
        let contents = "c only a comment\n";
        let mut reader = BufReader::new(contents.as_bytes());
        let mut dimacs = DimacsParser::new(&mut reader);

        assert!(dimacs.parse_preamble().is_err());
    }

    #[test]
    fn invalid_literal() {
        let contents = "p cnf 2 1\n1 x 0\n";
        let mut reader = BufReader::new(contents.as_bytes());

        assert!(parse(&mut reader).is_err());
    }

    #[test]
    fn literal_out_of_range() {
        let contents = "p cnf 2 1\n1 3 0\n";
        let mut reader = BufReader::new(contents.as_bytes());

        assert!(parse(&mut reader).is_err());
    }

    #[test]
    fn weights() {
        let contents = "p cnf 2 1
c p weight 1 0.3 0
c p weight -1 0.7 0
w 2 0.25
1 2 0
";
        let mut reader = BufReader::new(contents.as_bytes());
        let dimacs = parse(&mut reader).unwrap();
        let weights = dimacs.weights.unwrap();

        assert_eq!(dimacs.cnf.num_clauses(), 1);
        assert_eq!(*weights.weight(Literal::from_dimacs(1)), 0.3);
        assert_eq!(*weights.weight(Literal::from_dimacs(-1)), 0.7);
        assert_eq!(*weights.weight(Literal::from_dimacs(2)), 0.25);
        assert_eq!(*weights.weight(Literal::from_dimacs(-2)), 1.0);
    }

    #[test]
    fn unweighted_file_has_no_weights() {
        let contents = "p cnf 2 1\n1 2 0\n";
        let mut reader = BufReader::new(contents.as_bytes());

        assert!(parse(&mut reader).unwrap().weights.is_none());
    }
}
