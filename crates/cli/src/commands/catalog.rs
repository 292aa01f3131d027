#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseCase {
    pub name: &'static str,
    pub description: &'static str,
    pub queries: [&'static str; 3],
}

pub static USE_CASES: [UseCase; 5] = [
    UseCase {
        name: "Document Summarization",
        description: "Summarize key content from SharePoint documents",
        queries: [
            "Summarize the main points from the latest quarterly report",
            "What are the key takeaways from project documentation?",
            "Provide an executive summary of policy documents",
        ],
    },
    UseCase {
        name: "Content Discovery",
        description: "Find and discover relevant content in SharePoint",
        queries: [
            "What documents are available about budget planning?",
            "Find all training materials related to new employees",
            "Show me documents from the last quarter",
        ],
    },
    UseCase {
        name: "Knowledge Extraction",
        description: "Extract specific knowledge and insights",
        queries: [
            "What are the current project deadlines mentioned in documents?",
            "Extract contact information from team directories",
            "What are the compliance requirements mentioned in policies?",
        ],
    },
    UseCase {
        name: "Comparative Analysis",
        description: "Compare information across multiple documents",
        queries: [
            "Compare this quarter's performance with last quarter",
            "How do the new policies differ from previous versions?",
            "What changes were made in the latest project updates?",
        ],
    },
    UseCase {
        name: "Research Assistance",
        description: "Help with research and information gathering",
        queries: [
            "Research best practices mentioned in our knowledge base",
            "What expertise areas are covered in our team profiles?",
            "Find examples of successful project implementations",
        ],
    },
];

pub fn find(name: &str) -> Option<&'static UseCase> {
    let wanted = name.trim();
    USE_CASES.iter().find(|use_case| use_case.name.eq_ignore_ascii_case(wanted))
}

pub fn render_available() -> String {
    let mut lines = vec!["Available use cases:".to_string()];
    lines.extend(USE_CASES.iter().map(|use_case| format!("  - {}", use_case.name)));
    lines.join("\n")
}
