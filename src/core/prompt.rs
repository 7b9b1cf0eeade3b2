/// Fixed analysis rubric sent with every function
const ANALYSIS_RUBRIC: &str = "\
Analyze the following function for refactoring opportunities. Evaluate:

1. Complexity and documentation: is the function doing too much, and is its \
intent clear without external explanation?
2. Purity and error handling: are side effects contained, and are failure \
paths handled explicitly rather than swallowed?
3. Performance: are there avoidable allocations, repeated work, or \
inefficient data access patterns?
4. Edge cases: empty inputs, boundary values, and unexpected types.
5. Logical errors: off-by-one mistakes, inverted conditions, unreachable \
branches.
6. Security and input validation: is untrusted input validated before use?";

/// Fixed response-shape instruction appended to every prompt
const RESPONSE_SHAPE: &str = "\
Respond with exactly one JSON object of the shape \
{\"needsRefactor\": boolean, \"refactorPrompt\": string or null} \
and no surrounding formatting, markdown, or commentary. When needsRefactor \
is true, refactorPrompt must contain a concrete instruction for the refactor.";

/// Combine the fixed rubric with optional user-supplied requirements.
///
/// Pure function of its input; the requirement text is included verbatim.
pub fn build_prompt(user_requirement: Option<&str>) -> String {
    let mut prompt = String::from(ANALYSIS_RUBRIC);

    if let Some(requirement) = user_requirement.filter(|r| !r.trim().is_empty()) {
        prompt.push_str("\n\nAdditional requirements:\n");
        prompt.push_str(requirement);
    }

    prompt.push_str("\n\n");
    prompt.push_str(RESPONSE_SHAPE);
    prompt
}
