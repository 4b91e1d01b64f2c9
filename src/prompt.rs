use std::fmt;
use std::str::FromStr;

// Substituted by the knowledge base with the retrieved passages.
pub const SEARCH_RESULTS_PLACEHOLDER: &str = "$search_results$";

pub const DEFAULT_SUBJECT: &str = "AWS Services";

/// How the generated answer should be laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptStyle {
    /// Summary paragraph for the top result, then titled links for the rest.
    #[default]
    TopResult,
    /// Every result as a numbered entry with a one-line summary.
    RankedList,
    /// A single short paragraph pointing at the best source.
    Brief,
}

impl PromptStyle {
    pub fn name(&self) -> &'static str {
        match self {
            PromptStyle::TopResult => "top-result",
            PromptStyle::RankedList => "ranked-list",
            PromptStyle::Brief => "brief",
        }
    }

    fn layout_rules(&self) -> &'static str {
        match self {
            PromptStyle::TopResult => {
                "Generate a brief paragraph summary of the top result with a link to its source. \
For additional potential results, provide an article title and link.
Use exactly this layout:
Search Results for: \"<short restatement of the query>\"
First Result: <title>
<one paragraph summary>

Link: <source link>

Additional Results:
<title> - <one sentence description>
<source link>
(repeat for up to five additional results, most relevant first)"
            }
            PromptStyle::RankedList => {
                "List the relevant results in order of relevance, most relevant first.
Use exactly this layout:
Search Results for: \"<short restatement of the query>\"
1. <title> - <one sentence summary>
   <source link>
2. <title> - <one sentence summary>
   <source link>
(continue numbering for every relevant result, never skip a number)"
            }
            PromptStyle::Brief => {
                "Answer in a single short paragraph of no more than three sentences, \
then give the link to the most relevant source on its own line.
Use exactly this layout:
<answer paragraph>

Link: <source link>"
            }
        }
    }
}

impl fmt::Display for PromptStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PromptStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "top-result" => Ok(PromptStyle::TopResult),
            "ranked-list" => Ok(PromptStyle::RankedList),
            "brief" => Ok(PromptStyle::Brief),
            other => Err(format!(
                "unknown prompt style '{}', expected one of: top-result, ranked-list, brief",
                other
            )),
        }
    }
}

/// Instructional template sent with every retrieve-and-generate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub style: PromptStyle,
    pub subject: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            style: PromptStyle::default(),
            subject: DEFAULT_SUBJECT.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(style: PromptStyle, subject: impl Into<String>) -> Self {
        Self {
            style,
            subject: subject.into(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "You are a helpful search assistant that acts as a smart search engine that provides \
information about {subject}. Based on the search results:
{placeholder}
Respond to the specific query, focusing on the relevant information based on the search results.
{rules}
Do not add a \"Citations:\" section or a list of sources at the end of the answer. \
Sources are attached to the answer separately.
If the search results do not answer the query, say so in one sentence.",
            subject = self.subject,
            placeholder = SEARCH_RESULTS_PLACEHOLDER,
            rules = self.style.layout_rules(),
        )
    }
}
