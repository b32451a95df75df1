use super::asset::AssetManifest;
use super::template::{get_att, join, pseudo, reference, sub, Output, Resource, Template};
use crate::config::{HttpMethod, SignInAlias, VerificationStyle};
use crate::error::Result;
use crate::stack::{
    Authorization, ClientRegistration, ComputeTarget, Gateway, IdentityDirectory, LogicalId,
    ResourceServer, Route, Stack,
};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const ASSET_BUCKET: &str = "authstack-assets-${AWS::AccountId}-${AWS::Region}";
const BASIC_EXECUTION_POLICY: &str = ":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// Result of synthesizing a stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub stack_name: String,
    pub template: Template,
    pub assets: AssetManifest,
}

impl Synthesis {
    /// Write `<stack>.template.json` and `<stack>.assets.json` into `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;

        let template_path = dir.join(format!("{}.template.json", self.stack_name));
        fs::write(&template_path, self.template.to_json()? + "\n")?;

        let assets_path = dir.join(format!("{}.assets.json", self.stack_name));
        fs::write(&assets_path, serde_json::to_string_pretty(&self.assets)? + "\n")?;

        tracing::info!(dir = %dir.display(), stack = %self.stack_name, "wrote synthesis output");
        Ok(vec![template_path, assets_path])
    }
}

/// Turns a [`Stack`] into a deployment template.
///
/// Output depends only on the stack, so synthesizing twice gives identical JSON.
pub struct Synthesizer<'a> {
    stack: &'a Stack,
}

impl<'a> Synthesizer<'a> {
    pub fn new(stack: &'a Stack) -> Self {
        Self { stack }
    }

    pub fn synthesize(&self) -> Synthesis {
        let stack = self.stack;
        let mut template = Template::new(stack.description().map(str::to_string));

        self.add_directory(&mut template, stack.directory());
        for server in stack.resource_servers().values() {
            self.add_resource_server(&mut template, server);
        }
        for client in stack.clients().values() {
            self.add_client(&mut template, client);
        }
        for function in stack.functions().values() {
            self.add_function(&mut template, function);
        }
        if let Some(gateway) = stack.gateway() {
            self.add_gateway(&mut template, gateway);
        }

        tracing::debug!(
            stack = stack.name(),
            resources = template.resources.len(),
            outputs = template.outputs.len(),
            "synthesized template"
        );

        Synthesis {
            stack_name: stack.name().to_string(),
            template,
            assets: AssetManifest::from_stack(stack),
        }
    }

    fn add_directory(&self, template: &mut Template, directory: &IdentityDirectory) {
        let mut props = Map::new();
        props.insert(
            "AdminCreateUserConfig".into(),
            json!({ "AllowAdminCreateUserOnly": !directory.self_sign_up }),
        );
        props.insert(
            "AccountRecoverySetting".into(),
            json!({
                "RecoveryMechanisms": [
                    { "Name": "verified_phone_number", "Priority": 1 },
                    { "Name": "verified_email", "Priority": 2 }
                ]
            }),
        );

        let aliases = &directory.sign_in_aliases;
        let auto_verified: Vec<&str> = aliases
            .iter()
            .filter(|a| a.is_username_attribute())
            .map(SignInAlias::attribute)
            .collect();
        if !auto_verified.is_empty() {
            props.insert("AutoVerifiedAttributes".into(), json!(auto_verified));
        }
        let free_form = aliases.contains(&SignInAlias::Username)
            || aliases.contains(&SignInAlias::PreferredUsername);
        if free_form {
            let alias_attributes: Vec<&str> = aliases
                .iter()
                .filter(|a| **a != SignInAlias::Username)
                .map(SignInAlias::attribute)
                .collect();
            if !alias_attributes.is_empty() {
                props.insert("AliasAttributes".into(), json!(alias_attributes));
            }
        } else if !auto_verified.is_empty() {
            props.insert("UsernameAttributes".into(), json!(auto_verified));
        }

        if let Some(verification) = &directory.verification {
            let mut message = Map::new();
            message.insert(
                "DefaultEmailOption".into(),
                json!(verification.style.default_email_option()),
            );
            let (body_key, subject_key) = match verification.style {
                VerificationStyle::Code => ("EmailMessage", "EmailSubject"),
                VerificationStyle::Link => ("EmailMessageByLink", "EmailSubjectByLink"),
            };
            if let Some(body) = &verification.email_body {
                message.insert(body_key.into(), json!(body));
                if verification.style == VerificationStyle::Code {
                    props.insert("EmailVerificationMessage".into(), json!(body));
                }
            }
            if let Some(subject) = &verification.email_subject {
                message.insert(subject_key.into(), json!(subject));
                if verification.style == VerificationStyle::Code {
                    props.insert("EmailVerificationSubject".into(), json!(subject));
                }
            }
            if let Some(sms) = &verification.sms_message {
                message.insert("SmsMessage".into(), json!(sms));
                props.insert("SmsVerificationMessage".into(), json!(sms));
            }
            props.insert("VerificationMessageTemplate".into(), Value::Object(message));
        }

        template.add_resource(
            &directory.logical_id,
            Resource::new("AWS::Cognito::UserPool", Value::Object(props)).retain(),
        );

        if let Some(domain) = &directory.domain {
            template.add_resource(
                &domain.logical_id,
                Resource::new(
                    "AWS::Cognito::UserPoolDomain",
                    json!({
                        "Domain": domain.prefix,
                        "UserPoolId": reference(&directory.logical_id),
                    }),
                ),
            );
            template.add_output(
                "HostedDomainUrl",
                Output::new(
                    "Hosted sign-in domain",
                    join(
                        "",
                        vec![
                            json!("https://"),
                            reference(&domain.logical_id),
                            json!(".auth."),
                            pseudo("AWS::Region"),
                            json!(".amazoncognito.com"),
                        ],
                    ),
                ),
            );
        }
    }

    fn add_resource_server(&self, template: &mut Template, server: &ResourceServer) {
        let scopes: Vec<Value> = server
            .scopes
            .iter()
            .map(|(name, description)| {
                json!({ "ScopeName": name, "ScopeDescription": description })
            })
            .collect();
        template.add_resource(
            &server.logical_id,
            Resource::new(
                "AWS::Cognito::UserPoolResourceServer",
                json!({
                    "Identifier": server.id,
                    "Name": server.name,
                    "Scopes": scopes,
                    "UserPoolId": reference(&self.stack.directory().logical_id),
                }),
            ),
        );
    }

    fn add_client(&self, template: &mut Template, client: &ClientRegistration) {
        let mut props = Map::new();
        props.insert(
            "UserPoolId".into(),
            reference(&self.stack.directory().logical_id),
        );
        props.insert("GenerateSecret".into(), json!(client.requires_secret()));
        props.insert("AllowedOAuthFlowsUserPoolClient".into(), json!(true));
        props.insert(
            "AllowedOAuthFlows".into(),
            json!(client.flows.iter().map(|f| f.wire_name()).collect::<Vec<_>>()),
        );
        props.insert("AllowedOAuthScopes".into(), json!(client.scopes));
        props.insert("SupportedIdentityProviders".into(), json!(["COGNITO"]));

        let callbacks = client.effective_callback_urls();
        if !callbacks.is_empty() {
            props.insert("CallbackURLs".into(), json!(callbacks));
        }
        if !client.logout_urls.is_empty() {
            props.insert("LogoutURLs".into(), json!(client.logout_urls));
        }

        // Scope strings carry no reference, so the ordering has to be explicit.
        let depends_on: Vec<&LogicalId> = client
            .resource_servers()
            .into_iter()
            .filter_map(|id| self.stack.resource_servers().get(id))
            .map(|rs| &rs.logical_id)
            .collect();

        template.add_resource(
            &client.logical_id,
            Resource::new("AWS::Cognito::UserPoolClient", Value::Object(props))
                .depends_on(depends_on),
        );
        template.add_output(
            &format!("{}Id", client.logical_id),
            Output::new(
                format!("Client id of '{}'", client.name),
                reference(&client.logical_id),
            ),
        );
    }

    fn add_function(&self, template: &mut Template, function: &ComputeTarget) {
        let role_id = function.role_logical_id();
        template.add_resource(
            &role_id,
            Resource::new(
                "AWS::IAM::Role",
                json!({
                    "AssumeRolePolicyDocument": {
                        "Statement": [{
                            "Action": "sts:AssumeRole",
                            "Effect": "Allow",
                            "Principal": { "Service": "lambda.amazonaws.com" }
                        }],
                        "Version": "2012-10-17"
                    },
                    "ManagedPolicyArns": [join(
                        "",
                        vec![json!("arn:"), pseudo("AWS::Partition"), json!(BASIC_EXECUTION_POLICY)],
                    )],
                }),
            ),
        );

        let mut props = Map::new();
        props.insert(
            "Code".into(),
            json!({ "S3Bucket": sub(ASSET_BUCKET), "S3Key": function.code.object_key() }),
        );
        props.insert("Handler".into(), json!(function.handler));
        props.insert("MemorySize".into(), json!(function.memory_mb));
        props.insert("Role".into(), get_att(&role_id, "Arn"));
        props.insert("Runtime".into(), json!(function.runtime.identifier()));
        props.insert("Timeout".into(), json!(function.timeout.as_secs()));
        if !function.environment.is_empty() {
            props.insert(
                "Environment".into(),
                json!({ "Variables": function.environment }),
            );
        }

        template.add_resource(
            &function.logical_id,
            Resource::new("AWS::Lambda::Function", Value::Object(props)).depends_on([&role_id]),
        );
    }

    fn add_gateway(&self, template: &mut Template, gateway: &Gateway) {
        let api = &gateway.logical_id;
        template.add_resource(
            api,
            Resource::new(
                "AWS::ApiGateway::RestApi",
                json!({ "Name": gateway.display_name }),
            ),
        );

        for (name, authorizer) in &gateway.authorizers {
            template.add_resource(
                &authorizer.logical_id,
                Resource::new(
                    "AWS::ApiGateway::Authorizer",
                    json!({
                        "Name": name,
                        "RestApiId": reference(api),
                        "Type": "COGNITO_USER_POOLS",
                        "IdentitySource": authorizer.identity_source,
                        "ProviderARNs": [get_att(&self.stack.directory().logical_id, "Arn")],
                    }),
                ),
            );
        }

        for segments in gateway.resource_paths() {
            let (last, parent) = match segments.split_last() {
                Some(split) => split,
                None => continue,
            };
            template.add_resource(
                &gateway.resource_logical_id(&segments),
                Resource::new(
                    "AWS::ApiGateway::Resource",
                    json!({
                        "ParentId": resource_ref(gateway, parent),
                        "PathPart": last,
                        "RestApiId": reference(api),
                    }),
                ),
            );
        }

        let mut method_ids = Vec::with_capacity(gateway.routes.len());
        for route in &gateway.routes {
            method_ids.push(self.add_route(template, gateway, route));
        }

        let deployment_id = gateway.deployment_logical_id();
        let stage_id = gateway.stage_logical_id();
        template.add_resource(
            &deployment_id,
            Resource::new(
                "AWS::ApiGateway::Deployment",
                json!({
                    "RestApiId": reference(api),
                    "Description": format!("Routes {}", gateway.routes_fingerprint()),
                }),
            )
            .depends_on(&method_ids),
        );
        template.add_resource(
            &stage_id,
            Resource::new(
                "AWS::ApiGateway::Stage",
                json!({
                    "RestApiId": reference(api),
                    "DeploymentId": reference(&deployment_id),
                    "StageName": gateway.stage,
                }),
            ),
        );

        template.add_output(
            &format!("{}Endpoint", api),
            Output::new(
                format!("Invoke URL of '{}'", gateway.display_name),
                join(
                    "",
                    vec![
                        json!("https://"),
                        reference(api),
                        json!(".execute-api."),
                        pseudo("AWS::Region"),
                        json!("."),
                        pseudo("AWS::URLSuffix"),
                        json!("/"),
                        reference(&stage_id),
                        json!("/"),
                    ],
                ),
            ),
        );
    }

    fn add_route(&self, template: &mut Template, gateway: &Gateway, route: &Route) -> LogicalId {
        let api = &gateway.logical_id;
        let Some(function) = self.stack.function(route.target.as_str()) else {
            // Unreachable for a built stack: every route target resolved.
            return gateway.method_logical_id(route);
        };
        let function_arn = get_att(&function.logical_id, "Arn");

        let mut props = Map::new();
        props.insert("HttpMethod".into(), json!(route.method.as_str()));
        props.insert("ResourceId".into(), resource_ref(gateway, &route.segments()));
        props.insert("RestApiId".into(), reference(api));
        match &route.authorization {
            Authorization::Public => {
                props.insert("AuthorizationType".into(), json!("NONE"));
            }
            Authorization::Directory { authorizer, scopes } => {
                props.insert("AuthorizationType".into(), json!("COGNITO_USER_POOLS"));
                if let Some(a) = gateway.authorizers.get(authorizer) {
                    props.insert("AuthorizerId".into(), reference(&a.logical_id));
                }
                if !scopes.is_empty() {
                    props.insert("AuthorizationScopes".into(), json!(scopes));
                }
            }
        }
        props.insert(
            "Integration".into(),
            json!({
                "IntegrationHttpMethod": "POST",
                "Type": "AWS_PROXY",
                "Uri": join("", vec![
                    json!("arn:"),
                    pseudo("AWS::Partition"),
                    json!(":apigateway:"),
                    pseudo("AWS::Region"),
                    json!(":lambda:path/2015-03-31/functions/"),
                    function_arn.clone(),
                    json!("/invocations"),
                ]),
            }),
        );

        let method_id = gateway.method_logical_id(route);
        template.add_resource(
            &method_id,
            Resource::new("AWS::ApiGateway::Method", Value::Object(props)),
        );

        let method = match route.method {
            HttpMethod::Any => "*",
            other => other.as_str(),
        };
        template.add_resource(
            &gateway.permission_logical_id(route),
            Resource::new(
                "AWS::Lambda::Permission",
                json!({
                    "Action": "lambda:InvokeFunction",
                    "FunctionName": function_arn,
                    "Principal": "apigateway.amazonaws.com",
                    "SourceArn": join("", vec![
                        json!("arn:"),
                        pseudo("AWS::Partition"),
                        json!(":execute-api:"),
                        pseudo("AWS::Region"),
                        json!(":"),
                        pseudo("AWS::AccountId"),
                        json!(":"),
                        reference(api),
                        json!("/"),
                        reference(&gateway.stage_logical_id()),
                        json!(format!("/{}{}", method, route_path(route))),
                    ]),
                }),
            ),
        );

        method_id
    }
}

fn resource_ref(gateway: &Gateway, segments: &[&str]) -> Value {
    if segments.is_empty() {
        get_att(&gateway.logical_id, "RootResourceId")
    } else {
        reference(&gateway.resource_logical_id(segments))
    }
}

fn route_path(route: &Route) -> String {
    format!("/{}", route.segments().join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Parser;
    use crate::stack::StackBuilder;

    const MANIFEST: &str = r#"
stack:
  name: Demo
  description: demo stack
directory:
  name: UserPool
  self_sign_up: true
  sign_in_aliases: [email]
  verification:
    email_subject: Verify
    email_body: "Code {####}"
  domain:
    name: CognitoDomain
    prefix: demo-auth-domain
resource_servers:
  - name: ResourceServer
    identifier: api
    scopes:
      - { name: user, description: User }
clients:
  web:
    flows: [authorization_code]
    scopes: [openid, api/user]
  worker:
    generate_secret: true
    flows: [client_credentials]
    scopes: [api/user]
functions:
  handler:
    runtime: nodejs18.x
    handler: index.handler
    code: lambda
    environment:
      STAGE: prod
gateway:
  name: RestApi
  rest_api_name: Rest API
  authorizers:
    Auth:
      directory: UserPool
  routes:
    - { path: /, method: ANY, function: handler, authorizer: Auth }
    - { path: /items, method: GET, function: handler, authorizer: Auth, scopes: [api/user] }
    - { path: "/items/{id}", method: DELETE, function: handler, authorizer: Auth, scopes: [api/user] }
    - { path: /health, method: GET, function: handler }
"#;

    fn synthesis() -> Synthesis {
        let manifest = Parser::new().parse_manifest(MANIFEST).unwrap();
        let stack = StackBuilder::new()
            .manifest(manifest)
            .verify_artifacts(false)
            .build()
            .unwrap();
        Synthesizer::new(&stack).synthesize()
    }

    fn props<'a>(template: &'a Template, id: &str) -> &'a Value {
        &template.resource(id).unwrap_or_else(|| panic!("missing {id}")).properties
    }

    #[test]
    fn test_resource_inventory() {
        let template = synthesis().template;
        let count = |t: &str| template.resources_of_type(t).count();

        assert_eq!(count("AWS::Cognito::UserPool"), 1);
        assert_eq!(count("AWS::Cognito::UserPoolDomain"), 1);
        assert_eq!(count("AWS::Cognito::UserPoolResourceServer"), 1);
        assert_eq!(count("AWS::Cognito::UserPoolClient"), 2);
        assert_eq!(count("AWS::IAM::Role"), 1);
        assert_eq!(count("AWS::Lambda::Function"), 1);
        assert_eq!(count("AWS::ApiGateway::RestApi"), 1);
        assert_eq!(count("AWS::ApiGateway::Authorizer"), 1);
        // items, items/{id}, health
        assert_eq!(count("AWS::ApiGateway::Resource"), 3);
        assert_eq!(count("AWS::ApiGateway::Method"), 4);
        assert_eq!(count("AWS::Lambda::Permission"), 4);
        assert_eq!(count("AWS::ApiGateway::Deployment"), 1);
        assert_eq!(count("AWS::ApiGateway::Stage"), 1);
    }

    #[test]
    fn test_user_pool_is_retained() {
        let template = synthesis().template;
        let pool = template.resource("UserPool").unwrap();
        assert_eq!(pool.deletion_policy.as_deref(), Some("Retain"));
        assert_eq!(pool.properties["UsernameAttributes"], json!(["email"]));
        assert_eq!(
            pool.properties["VerificationMessageTemplate"]["DefaultEmailOption"],
            json!("CONFIRM_WITH_CODE")
        );
        assert_eq!(
            pool.properties["AdminCreateUserConfig"]["AllowAdminCreateUserOnly"],
            json!(false)
        );
    }

    #[test]
    fn test_clients_depend_on_resource_server() {
        let template = synthesis().template;
        for id in ["UserPoolweb", "UserPoolworker"] {
            assert_eq!(template.resource(id).unwrap().depends_on, vec!["ResourceServer"]);
        }

        let web = props(&template, "UserPoolweb");
        assert_eq!(web["AllowedOAuthFlows"], json!(["code"]));
        assert_eq!(web["AllowedOAuthScopes"], json!(["openid", "api/user"]));
        assert_eq!(web["CallbackURLs"], json!(["https://example.com"]));
        assert_eq!(web["GenerateSecret"], json!(false));

        let worker = props(&template, "UserPoolworker");
        assert_eq!(worker["AllowedOAuthFlows"], json!(["client_credentials"]));
        assert!(worker.get("CallbackURLs").is_none());
    }

    #[test]
    fn test_methods_carry_authorization() {
        let template = synthesis().template;

        let root = props(&template, "RestApiANY");
        assert_eq!(root["AuthorizationType"], json!("COGNITO_USER_POOLS"));
        assert!(root.get("AuthorizationScopes").is_none());
        assert_eq!(root["ResourceId"], json!({ "Fn::GetAtt": ["RestApi", "RootResourceId"] }));

        let items = props(&template, "RestApiitemsGET");
        assert_eq!(items["AuthorizationScopes"], json!(["api/user"]));
        assert_eq!(items["AuthorizerId"], json!({ "Ref": "Auth" }));
        assert_eq!(items["Integration"]["Type"], json!("AWS_PROXY"));

        let health = props(&template, "RestApihealthGET");
        assert_eq!(health["AuthorizationType"], json!("NONE"));
        assert!(health.get("AuthorizerId").is_none());

        let child = props(&template, "RestApiitemsid");
        assert_eq!(child["ParentId"], json!({ "Ref": "RestApiitems" }));
        assert_eq!(child["PathPart"], json!("{id}"));
    }

    #[test]
    fn test_permission_source_arn() {
        let template = synthesis().template;
        let permission = props(&template, "RestApiANYPermission");
        let parts = permission["SourceArn"]["Fn::Join"][1].as_array().unwrap();
        assert_eq!(parts.last().unwrap(), &json!("/*/"));

        let permission = props(&template, "RestApiitemsidDELETEPermission");
        let parts = permission["SourceArn"]["Fn::Join"][1].as_array().unwrap();
        assert_eq!(parts.last().unwrap(), &json!("/DELETE/items/{id}"));
    }

    #[test]
    fn test_deployment_waits_for_methods() {
        let template = synthesis().template;
        let ids: Vec<&str> = template.resources_of_type("AWS::ApiGateway::Deployment").collect();
        assert_eq!(ids.len(), 1);
        assert!(ids[0].starts_with("RestApiDeployment"));
        let deployment = template.resource(ids[0]).unwrap();
        assert_eq!(deployment.depends_on.len(), 4);
        assert_eq!(
            props(&template, "RestApiDeploymentStageprod")["DeploymentId"],
            json!({ "Ref": ids[0] })
        );
        assert_eq!(
            props(&template, "RestApiDeploymentStageprod")["StageName"],
            json!("prod")
        );
    }

    #[test]
    fn test_function_and_assets() {
        let synthesis = synthesis();
        let function = props(&synthesis.template, "handler");
        assert_eq!(function["Runtime"], json!("nodejs18.x"));
        assert_eq!(function["Timeout"], json!(3));
        assert_eq!(function["Environment"]["Variables"]["STAGE"], json!("prod"));
        assert_eq!(function["Role"], json!({ "Fn::GetAtt": ["handlerServiceRole", "Arn"] }));

        assert_eq!(synthesis.assets.len(), 1);
        let key = function["Code"]["S3Key"].as_str().unwrap();
        assert!(synthesis.assets.files.values().any(|a| a.object_key == key));
    }

    #[test]
    fn test_outputs() {
        let template = synthesis().template;
        let names: Vec<&str> = template.outputs.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["HostedDomainUrl", "RestApiEndpoint", "UserPoolwebId", "UserPoolworkerId"]
        );
    }

    #[test]
    fn test_synthesis_is_idempotent() {
        let a = synthesis().template.to_json().unwrap();
        let b = synthesis().template.to_json().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_write_to() {
        let temp = tempfile::tempdir().unwrap();
        let written = synthesis().write_to(temp.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(temp.path().join("Demo.template.json").exists());
        assert!(temp.path().join("Demo.assets.json").exists());

        let raw = fs::read_to_string(temp.path().join("Demo.template.json")).unwrap();
        let parsed: Template = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, synthesis().template);
    }
}
