use relay_compiler::{CompileError, StepProcedure, compile};
use relay_config::{
  ControlFlow, FieldBinding, FieldBindings, StepBindings, StepType, TypeDescriptor,
  ValidationError, WorkflowDefinition, WorkflowStep,
};
use serde_json::json;

fn bindings(entries: &[(&str, &[(&str, FieldBinding)])]) -> StepBindings {
  entries
    .iter()
    .map(|(step_id, fields)| {
      let fields: FieldBindings = fields
        .iter()
        .map(|(target, binding)| (target.to_string(), binding.clone()))
        .collect();
      (step_id.to_string(), fields)
    })
    .collect()
}

/// fetchPage -> extractTitle -> sendEmail
fn page_digest() -> (WorkflowDefinition, StepBindings) {
  let mut def = WorkflowDefinition::new("digest", "Page digest");
  def.input_schema = Some(TypeDescriptor::object(
    [("email", TypeDescriptor::of("string"))],
    &["email"],
  ));
  def.steps = vec![
    WorkflowStep::external_tool("fetchPage", 0, "BROWSER_FETCH", "browser"),
    WorkflowStep::custom_code("extractTitle", 1, "return { title = input.html }"),
    WorkflowStep::external_tool("sendEmail", 2, "GMAIL_SEND", "gmail"),
  ];

  let bindings = bindings(&[
    (
      "extractTitle",
      &[("html", FieldBinding::step_output("fetchPage", "html"))],
    ),
    (
      "sendEmail",
      &[
        ("body", FieldBinding::step_output("extractTitle", "data.title")),
        ("to", FieldBinding::workflow_input("email")),
      ],
    ),
  ]);

  (def, bindings)
}

#[test]
fn test_compile_is_deterministic() {
  let (def, bindings) = page_digest();

  let first = compile(&def, &bindings).unwrap();
  let second = compile(&def, &bindings).unwrap();

  let first_pipeline = first.pipeline.as_ref().unwrap();
  let second_pipeline = second.pipeline.as_ref().unwrap();

  assert_eq!(
    serde_json::to_string(first_pipeline).unwrap(),
    serde_json::to_string(second_pipeline).unwrap()
  );
  assert_eq!(
    first_pipeline.render().unwrap(),
    second_pipeline.render().unwrap()
  );
  assert_eq!(first.metadata, second.metadata);
  assert_eq!(first.error_messages(), second.error_messages());
}

#[test]
fn test_steps_follow_list_index() {
  let mut def = WorkflowDefinition::new("ordered", "Ordered");
  def.steps = vec![
    WorkflowStep::custom_code("a", 0, "return input"),
    WorkflowStep::custom_code("c", 2, "return input"),
    WorkflowStep::custom_code("b", 1, "return input"),
  ];

  let output = compile(&def, &StepBindings::new()).unwrap();
  let pipeline = output.pipeline.unwrap();

  let order: Vec<&str> = pipeline.steps.iter().map(|s| s.step_id.as_str()).collect();
  assert_eq!(order, vec!["a", "b", "c"]);

  let ids: Vec<&str> = pipeline.steps.iter().map(|s| s.id.as_str()).collect();
  assert_eq!(ids, vec!["step0_a", "step1_b", "step2_c"]);
  assert_eq!(pipeline.step("step1_b").unwrap().step_id, "b");
  assert_eq!(pipeline.step_for("c").unwrap().id, "step2_c");
}

#[test]
fn test_self_and_forward_references_are_compile_errors() {
  let mut def = WorkflowDefinition::new("cyclic", "Cyclic");
  def.steps = vec![
    WorkflowStep::custom_code("first", 0, "return input"),
    WorkflowStep::custom_code("second", 1, "return input"),
    WorkflowStep::custom_code("third", 2, "return input"),
  ];
  let bindings = bindings(&[
    ("first", &[("x", FieldBinding::step_output("third", "x"))]),
    ("second", &[("y", FieldBinding::step_output("second", "y"))]),
  ]);

  let output = compile(&def, &bindings).unwrap();

  assert_eq!(
    output.errors,
    vec![
      CompileError::ForwardReference {
        step_id: "first".to_string(),
        field: "x".to_string(),
        source_step_id: "third".to_string(),
      },
      CompileError::SelfReference {
        step_id: "second".to_string(),
        field: "y".to_string(),
      },
    ]
  );

  // The broken steps are left out, the rest still compiles.
  let pipeline = output.pipeline.unwrap();
  let remaining: Vec<&str> = pipeline.steps.iter().map(|s| s.step_id.as_str()).collect();
  assert_eq!(remaining, vec!["third"]);
}

#[test]
fn test_dangling_source_is_collected_not_fatal() {
  let (def, mut bindings) = page_digest();
  bindings.insert(
    "extractTitle".to_string(),
    [(
      "html".to_string(),
      FieldBinding::step_output("missingStep", "html"),
    )]
    .into_iter()
    .collect(),
  );
  bindings.insert("ghost".to_string(), FieldBindings::new());

  let output = compile(&def, &bindings).unwrap();

  assert_eq!(
    output.error_messages(),
    vec![
      "bindings declared for unknown step 'ghost'".to_string(),
      "step 'extractTitle': field 'html' references unknown step 'missingStep'".to_string(),
    ]
  );
  let pipeline = output.pipeline.unwrap();
  assert_eq!(pipeline.steps.len(), 2);
  assert!(pipeline.step_for("extractTitle").is_none());
}

#[test]
fn test_control_flow_steps_are_dropped_but_counted() {
  let (mut def, bindings) = page_digest();
  let mut loop_step = WorkflowStep::new("eachLink", StepType::ControlFlow, 3);
  loop_step.control_type = Some("loop".to_string());
  let mut branch_step = WorkflowStep::new("maybe", StepType::ControlFlow, 4);
  branch_step.control_type = Some("branch".to_string());
  let mut other_loop = WorkflowStep::new("again", StepType::ControlFlow, 5);
  other_loop.control_type = Some("loop".to_string());
  def.steps.extend([loop_step, branch_step, other_loop]);

  let output = compile(&def, &bindings).unwrap();

  assert_eq!(output.metadata.step_count, 6);
  assert_eq!(output.pipeline.as_ref().unwrap().steps.len(), 3);
  assert_eq!(
    output.error_messages(),
    vec!["not yet supported: branch, loop".to_string()]
  );
}

#[test]
fn test_non_sequential_workflow_withholds_pipeline() {
  let (mut def, bindings) = page_digest();
  def.control_flow = ControlFlow {
    kind: "parallel".to_string(),
  };

  let output = compile(&def, &bindings).unwrap();

  assert!(output.pipeline.is_none());
  assert_eq!(output.metadata.step_count, 3);
  assert_eq!(
    output.error_messages(),
    vec!["not yet supported: parallel".to_string()]
  );
}

#[test]
fn test_required_connections_skip_no_auth_tools() {
  let (mut def, bindings) = page_digest();
  def.steps[0].no_auth = true;
  def.steps.push(WorkflowStep::external_tool("notify", 3, "GMAIL_DRAFT", "gmail"));
  def.steps.push(WorkflowStep::external_tool("post", 4, "SLACK_POST", "slack"));

  let output = compile(&def, &bindings).unwrap();

  let required: Vec<&str> = output
    .metadata
    .required_connections
    .iter()
    .map(String::as_str)
    .collect();
  assert_eq!(required, vec!["gmail", "slack"]);

  let fetch = output.pipeline.as_ref().unwrap().step_for("fetchPage").unwrap();
  assert_eq!(
    fetch.procedure,
    StepProcedure::ExternalTool {
      tool_id: "BROWSER_FETCH".to_string(),
      toolkit_slug: "browser".to_string(),
      requires_auth: false,
    }
  );
}

#[test]
fn test_invalid_definition_is_fatal() {
  let (mut def, bindings) = page_digest();
  def.steps.push(WorkflowStep::custom_code("fetchPage", 9, "return input"));

  let err = compile(&def, &bindings).unwrap_err();
  assert_eq!(
    err,
    ValidationError::DuplicateStepId {
      step_id: "fetchPage".to_string()
    }
  );
}

#[test]
fn test_pipeline_round_trips_through_json() {
  let (def, bindings) = page_digest();
  let pipeline = compile(&def, &bindings).unwrap().pipeline.unwrap();

  let stored = serde_json::to_value(&pipeline).unwrap();
  assert_eq!(stored["workflowId"], json!("digest"));
  assert_eq!(stored["metadata"]["stepCount"], json!(3));

  let restored: relay_compiler::CompiledPipeline = serde_json::from_value(stored).unwrap();
  assert_eq!(restored, pipeline);
  assert_eq!(restored.step("step2_sendEmail").unwrap().step_id, "sendEmail");
}

#[test]
fn test_render_shows_mappings_and_procedures() {
  let (def, bindings) = page_digest();
  let text = compile(&def, &bindings)
    .unwrap()
    .pipeline
    .unwrap()
    .render()
    .unwrap();

  assert!(text.starts_with("# workflow \"digest\": \"Page digest\"\n"));
  assert!(text.contains("# requires: browser, gmail\n"));
  assert!(text.contains("input  = object({ email: string() })\n"));
  assert!(text.contains("    body <- steps[\"extractTitle\"].output.title\n"));
  assert!(text.contains("    to <- input.email\n"));
  assert!(text.contains("  run    = tool(\"GMAIL_SEND\", account = connections[\"gmail\"])\n"));
  assert!(text.contains("    | return { title = input.html }\n"));
}
